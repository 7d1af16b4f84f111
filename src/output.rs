//! Result types produced by a table-extraction run.

use crate::error::{PageError, TableOcrError};
use crate::table::Table;
use serde::{Deserialize, Serialize};

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PageOutcome {
    /// Extraction succeeded and found at least one table.
    TablesFound(Vec<Table>),
    /// Extraction succeeded but the page holds no table.
    NoTablesFound,
    /// Extraction failed; the run continued with the next page.
    ExtractionFailed(PageError),
}

impl PageOutcome {
    /// Classify a successful extraction by whether it returned tables.
    pub fn from_tables(tables: Vec<Table>) -> Self {
        if tables.is_empty() {
            PageOutcome::NoTablesFound
        } else {
            PageOutcome::TablesFound(tables)
        }
    }

    pub fn tables(&self) -> &[Table] {
        match self {
            PageOutcome::TablesFound(t) => t,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&PageError> {
        match self {
            PageOutcome::ExtractionFailed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PageOutcome::ExtractionFailed(_))
    }
}

/// Result of one call to the table-extraction client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    TablesFound(usize),
    NoTables,
    RateLimited,
    Failed,
}

/// One call to the table-extraction client for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    /// 1-indexed attempt number.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Per-page record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    pub outcome: PageOutcome,
    /// Every client call made for this page, in order.
    pub attempts: Vec<ExtractionAttempt>,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
    /// `data:image/png;base64,…` preview of the page, when enabled.
    #[serde(skip)]
    pub preview: Option<String>,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Pages that went through the pipeline.
    pub processed_pages: usize,
    pub pages_with_tables: usize,
    pub empty_pages: usize,
    pub failed_pages: usize,
    pub total_tables: usize,
    /// Client calls across all pages, retries included.
    pub total_attempts: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub extraction_duration_ms: u64,
}

impl ExtractionStats {
    /// Count outcomes and attempts over `pages`; durations are left at zero.
    pub fn tally(total_pages: usize, pages: &[PageResult]) -> Self {
        let mut stats = ExtractionStats {
            total_pages,
            processed_pages: pages.len(),
            ..Default::default()
        };
        for page in pages {
            stats.total_attempts += page.attempts.len();
            match &page.outcome {
                PageOutcome::TablesFound(t) => {
                    stats.pages_with_tables += 1;
                    stats.total_tables += t.len();
                }
                PageOutcome::NoTablesFound => stats.empty_pages += 1,
                PageOutcome::ExtractionFailed(_) => stats.failed_pages += 1,
            }
        }
        stats
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Source label (path, URL or `<memory>`).
    pub source: String,
    /// Page results in document order.
    pub pages: Vec<PageResult>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Turn any failed page into [`TableOcrError::PartialFailure`].
    pub fn into_result(self) -> Result<Self, TableOcrError> {
        let failed = self.stats.failed_pages;
        if failed == 0 {
            return Ok(self);
        }
        Err(TableOcrError::PartialFailure {
            success: self.stats.processed_pages - failed,
            failed,
            total: self.stats.processed_pages,
        })
    }

    /// All tables of the run, paired with their page number.
    pub fn tables(&self) -> impl Iterator<Item = (usize, &Table)> {
        self.pages
            .iter()
            .flat_map(|p| p.outcome.tables().iter().map(move |t| (p.page_num, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_num: usize, outcome: PageOutcome, attempts: u32) -> PageResult {
        PageResult {
            page_num,
            outcome,
            attempts: (1..=attempts)
                .map(|attempt| ExtractionAttempt {
                    attempt,
                    outcome: AttemptOutcome::RateLimited,
                })
                .collect(),
            duration_ms: 0,
            preview: None,
        }
    }

    #[test]
    fn empty_extraction_is_no_tables_found() {
        assert_eq!(PageOutcome::from_tables(vec![]), PageOutcome::NoTablesFound);
        let t = Table::from_rows([["a"]]);
        assert_eq!(
            PageOutcome::from_tables(vec![t.clone()]),
            PageOutcome::TablesFound(vec![t])
        );
    }

    #[test]
    fn tally_counts_outcomes_and_attempts() {
        let pages = vec![
            page(
                1,
                PageOutcome::TablesFound(vec![
                    Table::from_rows([["a"]]),
                    Table::from_rows([["b"]]),
                ]),
                1,
            ),
            page(2, PageOutcome::NoTablesFound, 1),
            page(
                3,
                PageOutcome::ExtractionFailed(PageError::ExtractionFailed {
                    page: 3,
                    detail: "denied".into(),
                }),
                3,
            ),
        ];
        let stats = ExtractionStats::tally(4, &pages);
        assert_eq!(stats.total_pages, 4);
        assert_eq!(stats.processed_pages, 3);
        assert_eq!(stats.pages_with_tables, 1);
        assert_eq!(stats.empty_pages, 1);
        assert_eq!(stats.failed_pages, 1);
        assert_eq!(stats.total_tables, 2);
        assert_eq!(stats.total_attempts, 5);

        let output = ExtractionOutput {
            source: "doc.pdf".into(),
            stats,
            pages,
        };
        assert_eq!(output.tables().map(|(p, _)| p).collect::<Vec<_>>(), vec![1, 1]);
        let err = output.into_result().unwrap_err();
        assert!(err.to_string().contains("1/3"));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(PageOutcome::NoTablesFound).unwrap();
        assert_eq!(json["status"], "no_tables_found");
    }
}

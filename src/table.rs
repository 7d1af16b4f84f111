//! Detected tables and their HTML rendering.
//!
//! A [`Table`] is a sparse grid of [`TableCell`]s, each anchored at a
//! `(row, column)` and optionally spanning several rows or columns. The
//! grid is what the OCR service hands back; [`Table::to_html`] turns it into
//! the markup shown to the user.

use crate::config::ExtractionOptions;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Role of a cell inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellKind {
    #[default]
    Content,
    ColumnHeader,
    RowHeader,
    StubHead,
    Description,
}

impl CellKind {
    fn is_header(self) -> bool {
        matches!(
            self,
            CellKind::ColumnHeader | CellKind::RowHeader | CellKind::StubHead
        )
    }
}

/// One cell of a detected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: usize,
    pub column: usize,
    pub row_span: usize,
    pub column_span: usize,
    pub kind: CellKind,
    /// Recognised text; lines are separated by `\n`.
    pub content: String,
    /// Mean OCR confidence of the words read in the cell, in `0.0..=1.0`.
    pub confidence: Option<f32>,
}

impl TableCell {
    /// A 1×1 content cell.
    pub fn new(row: usize, column: usize, content: impl Into<String>) -> Self {
        Self {
            row,
            column,
            row_span: 1,
            column_span: 1,
            kind: CellKind::Content,
            content: content.into(),
            confidence: None,
        }
    }

    pub fn with_span(mut self, row_span: usize, column_span: usize) -> Self {
        self.row_span = row_span.max(1);
        self.column_span = column_span.max(1);
        self
    }

    pub fn with_kind(mut self, kind: CellKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    fn lines(&self) -> Vec<&str> {
        self.content.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    }
}

/// A tabular region detected on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<TableCell>,
}

impl Table {
    /// Build a table; cells are sorted into reading order.
    pub fn new(row_count: usize, column_count: usize, mut cells: Vec<TableCell>) -> Self {
        cells.sort_by_key(|c| (c.row, c.column));
        Self {
            row_count,
            column_count,
            cells,
        }
    }

    /// Build a table from plain rows of text, one cell per string.
    pub fn from_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells = Vec::new();
        let mut row_count = 0;
        let mut column_count = 0;
        for (r, row) in rows.into_iter().enumerate() {
            row_count = r + 1;
            for (c, text) in row.into_iter().enumerate() {
                column_count = column_count.max(c + 1);
                cells.push(TableCell::new(r, c, text));
            }
        }
        Self::new(row_count, column_count, cells)
    }

    /// `true` when no cell holds any text.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.content.trim().is_empty())
    }

    /// Apply the table-level parts of [`ExtractionOptions`].
    ///
    /// `min_confidence` is not handled here: it filters individual words,
    /// which only the client that produced them can see.
    pub fn apply_options(self, options: &ExtractionOptions) -> Self {
        if options.detect_implicit_rows {
            self.split_implicit_rows()
        } else {
            self
        }
    }

    /// Split rows whose text lines imply several physical rows.
    ///
    /// A row is split into `k` rows when every populated single-row cell
    /// anchored in it holds exactly `k > 1` lines. Cells spanning the row
    /// (or anchored in it with a row span) grow by `k - 1` instead. Header
    /// rows keep their wrapped captions.
    pub fn split_implicit_rows(self) -> Self {
        let mut factor = vec![1usize; self.row_count];
        for (r, slot) in factor.iter_mut().enumerate() {
            let populated: Vec<&TableCell> = self
                .cells
                .iter()
                .filter(|c| c.row == r && c.row_span == 1 && !c.lines().is_empty())
                .collect();
            if populated.iter().all(|c| c.kind.is_header()) {
                continue;
            }
            let counts: Vec<usize> = populated.iter().map(|c| c.lines().len()).collect();
            if let Some(&k) = counts.first() {
                if k > 1 && counts.iter().all(|&n| n == k) {
                    *slot = k;
                }
            }
        }
        if factor.iter().all(|&k| k == 1) {
            return self;
        }

        // start[r] = first new row of old row r; start[row_count] = new row count
        let mut start = Vec::with_capacity(self.row_count + 1);
        let mut acc = 0;
        for &k in &factor {
            start.push(acc);
            acc += k;
        }
        start.push(acc);
        let new_row_of = |r: usize| start[r.min(self.row_count)];

        let mut cells = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            let first = new_row_of(cell.row);
            let end = new_row_of(cell.row + cell.row_span);
            let k = factor.get(cell.row).copied().unwrap_or(1);
            let lines = cell.lines();
            if cell.row_span == 1 && k > 1 && lines.len() == k {
                for (i, line) in lines.iter().enumerate() {
                    cells.push(TableCell {
                        row: first + i,
                        row_span: 1,
                        content: (*line).to_string(),
                        ..cell.clone()
                    });
                }
            } else {
                cells.push(TableCell {
                    row: first,
                    row_span: (end - first).max(1),
                    ..cell.clone()
                });
            }
        }
        Table::new(acc, self.column_count, cells)
    }

    /// Render the table as an HTML `<table>`, with an optional caption.
    pub fn to_html(&self, title: Option<&str>) -> String {
        let mut html = String::from("<table>\n");
        if let Some(t) = title {
            let _ = writeln!(html, "  <caption>{}</caption>", escape_html(t));
        }
        for r in 0..self.row_count {
            html.push_str("  <tr>");
            for cell in self.cells.iter().filter(|c| c.row == r) {
                let tag = if cell.kind.is_header() { "th" } else { "td" };
                let _ = write!(html, "<{tag}");
                if cell.row_span > 1 {
                    let _ = write!(html, " rowspan=\"{}\"", cell.row_span);
                }
                if cell.column_span > 1 {
                    let _ = write!(html, " colspan=\"{}\"", cell.column_span);
                }
                let text = cell
                    .content
                    .lines()
                    .map(escape_html)
                    .collect::<Vec<_>>()
                    .join("<br>");
                let _ = write!(html, ">{text}</{tag}>");
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>");
        html
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_renders_rows_and_caption() {
        let t = Table::from_rows([["Item", "Qty"], ["Bolts", "12"]]);
        let html = t.to_html(Some("Extracted Table 1"));
        assert!(html.starts_with("<table>\n  <caption>Extracted Table 1</caption>"));
        assert!(html.contains("<tr><td>Item</td><td>Qty</td></tr>"));
        assert!(html.contains("<tr><td>Bolts</td><td>12</td></tr>"));
        assert!(html.ends_with("</table>"));
    }

    #[test]
    fn html_escapes_content_and_marks_headers() {
        let t = Table::new(
            1,
            2,
            vec![
                TableCell::new(0, 0, "a < b & c").with_kind(CellKind::ColumnHeader),
                TableCell::new(0, 1, "line1\nline2"),
            ],
        );
        let html = t.to_html(None);
        assert!(html.contains("<th>a &lt; b &amp; c</th>"));
        assert!(html.contains("<td>line1<br>line2</td>"));
        assert!(!html.contains("<caption>"));
    }

    #[test]
    fn html_emits_spans() {
        let t = Table::new(
            2,
            2,
            vec![
                TableCell::new(0, 0, "merged").with_span(2, 1),
                TableCell::new(0, 1, "top"),
                TableCell::new(1, 1, "bottom"),
            ],
        );
        let html = t.to_html(None);
        assert!(html.contains("<td rowspan=\"2\">merged</td><td>top</td>"));
        assert!(html.contains("<tr><td>bottom</td></tr>"));
    }

    #[test]
    fn implicit_rows_split_uniform_multiline_row() {
        let t = Table::new(
            2,
            2,
            vec![
                TableCell::new(0, 0, "Name"),
                TableCell::new(0, 1, "Age"),
                TableCell::new(1, 0, "Ann\nBob"),
                TableCell::new(1, 1, "31\n42"),
            ],
        )
        .split_implicit_rows();
        assert_eq!(t.row_count, 3);
        let grid: Vec<(usize, usize, &str)> = t
            .cells
            .iter()
            .map(|c| (c.row, c.column, c.content.as_str()))
            .collect();
        assert_eq!(
            grid,
            vec![
                (0, 0, "Name"),
                (0, 1, "Age"),
                (1, 0, "Ann"),
                (1, 1, "31"),
                (2, 0, "Bob"),
                (2, 1, "42"),
            ]
        );
    }

    #[test]
    fn implicit_rows_extend_spanning_cells() {
        let t = Table::new(
            2,
            3,
            vec![
                TableCell::new(0, 0, "Group").with_span(2, 1),
                TableCell::new(0, 1, "a\nb"),
                TableCell::new(0, 2, "1\n2"),
                TableCell::new(1, 1, "c"),
                TableCell::new(1, 2, "3"),
            ],
        )
        .split_implicit_rows();
        assert_eq!(t.row_count, 3);
        let group = t.cells.iter().find(|c| c.content == "Group").unwrap();
        assert_eq!((group.row, group.row_span), (0, 3));
        let c = t.cells.iter().find(|c| c.content == "c").unwrap();
        assert_eq!(c.row, 2);
    }

    #[test]
    fn implicit_rows_leave_ragged_rows_alone() {
        let original = Table::new(
            1,
            2,
            vec![TableCell::new(0, 0, "a\nb"), TableCell::new(0, 1, "single")],
        );
        assert_eq!(original.clone().split_implicit_rows(), original);
    }

    #[test]
    fn implicit_rows_keep_wrapped_header_row() {
        let t = Table::new(
            2,
            2,
            vec![
                TableCell::new(0, 0, "Unit\nPrice").with_kind(CellKind::ColumnHeader),
                TableCell::new(0, 1, "Qty\nOrdered").with_kind(CellKind::ColumnHeader),
                TableCell::new(1, 0, "4.50\n2.10"),
                TableCell::new(1, 1, "3\n8"),
            ],
        )
        .split_implicit_rows();
        assert_eq!(t.row_count, 3);
        let header: Vec<(usize, &str)> = t
            .cells
            .iter()
            .filter(|c| c.kind == CellKind::ColumnHeader)
            .map(|c| (c.row, c.content.as_str()))
            .collect();
        assert_eq!(header, vec![(0, "Unit\nPrice"), (0, "Qty\nOrdered")]);
        let body_rows: Vec<usize> = t.cells.iter().skip(2).map(|c| c.row).collect();
        assert_eq!(body_rows, vec![1, 1, 2, 2]);
    }

    #[test]
    fn apply_options_respects_flags() {
        let t = Table::new(1, 1, vec![TableCell::new(0, 0, "x\ny")]);
        let opts = ExtractionOptions {
            detect_implicit_rows: false,
            ..ExtractionOptions::default()
        };
        assert_eq!(t.clone().apply_options(&opts).row_count, 1);
        assert_eq!(t.apply_options(&ExtractionOptions::default()).row_count, 2);
    }

    #[test]
    fn blank_detection() {
        assert!(Table::from_rows([[" ", ""]]).is_blank());
        assert!(!Table::from_rows([["x"]]).is_blank());
    }
}

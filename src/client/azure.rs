//! Azure AI Document Intelligence client (`prebuilt-layout` model).
//!
//! Analysis is asynchronous on the service side:
//!
//! ```text
//! POST …/documentModels/{model}:analyze   ──▶ 202 + Operation-Location
//! GET  {Operation-Location}  (poll)       ──▶ running … succeeded | failed
//! ```
//!
//! HTTP 429 on either request, or an operation that failed with a
//! throttling code, is reported as [`ClientError::RateLimited`]. Everything
//! else is a permanent failure for that call.

use crate::client::TableExtractionClient;
use crate::config::{AzureConfig, ExtractionConfig, ExtractionOptions};
use crate::error::{ClientError, TableOcrError};
use crate::pipeline::scratch::MaterializedImage;
use crate::table::{CellKind, Table, TableCell};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";
const MAX_DETAIL_LEN: usize = 300;

/// Table extraction through Azure AI Document Intelligence.
#[derive(Debug, Clone)]
pub struct AzureLayoutClient {
    http: reqwest::Client,
    config: AzureConfig,
}

impl AzureLayoutClient {
    /// Build a client; `timeout_secs` bounds each HTTP request.
    pub fn new(config: AzureConfig, timeout_secs: u64) -> Result<Self, TableOcrError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TableOcrError::ClientNotConfigured {
                hint: format!("could not build HTTP client: {e}"),
            })?;
        info!(
            "Azure Document Intelligence client: {} (model {}, api {})",
            config.endpoint, config.model_id, config.api_version
        );
        Ok(Self { http, config })
    }

    /// Build a client from the run configuration.
    ///
    /// Fails with [`TableOcrError::ClientNotConfigured`] when no Azure
    /// credentials were supplied.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, TableOcrError> {
        let azure = config
            .azure
            .clone()
            .ok_or_else(|| TableOcrError::ClientNotConfigured {
                hint: "set an Azure Document Intelligence endpoint and API key".into(),
            })?;
        if !config.options.detect_borderless_tables {
            warn!(
                "{} reports tables with and without ruling lines alike; \
                 disabling borderless tables has no effect",
                azure.model_id
            );
        }
        Self::new(azure, config.api_timeout_secs)
    }

    /// URL of the analyze request.
    pub fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.config.endpoint.trim().trim_end_matches('/'),
            self.config.model_id,
            self.config.api_version
        )
    }

    async fn submit(&self, body: Vec<u8>, mime_type: &str) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.api_key)
            .header(CONTENT_TYPE, mime_type)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed("missing Operation-Location header".into()))
    }

    async fn poll(&self, location: &str) -> Result<AnalyzeResult, ClientError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for poll in 1..=self.config.max_polls {
            tokio::time::sleep(interval).await;

            let response = self
                .http
                .get(location)
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.api_key)
                .send()
                .await
                .map_err(transport_error)?;

            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let body = response.text().await.map_err(transport_error)?;
            let operation: AnalyzeOperation = serde_json::from_str(&body)
                .map_err(|e| ClientError::Malformed(format!("analyze status: {e}")))?;

            match operation.status {
                OperationStatus::Succeeded => {
                    return operation.analyze_result.ok_or_else(|| {
                        ClientError::Malformed("succeeded without analyzeResult".into())
                    });
                }
                OperationStatus::Failed | OperationStatus::Canceled => {
                    return Err(operation_error(operation.error));
                }
                OperationStatus::NotStarted | OperationStatus::Running => {
                    debug!("Analysis still running (poll {}/{})", poll, self.config.max_polls);
                }
            }
        }
        Err(ClientError::Timeout {
            polls: self.config.max_polls,
        })
    }
}

impl TableExtractionClient for AzureLayoutClient {
    async fn extract_tables(
        &self,
        image: &MaterializedImage,
        options: &ExtractionOptions,
    ) -> Result<Vec<Table>, ClientError> {
        let body = image
            .read()
            .await
            .map_err(|e| ClientError::Image(e.to_string()))?;
        debug!(
            "Page {}: submitting {} bytes for analysis",
            image.page_num(),
            body.len()
        );

        let location = self.submit(body, image.mime_type()).await?;
        let result = self.poll(&location).await?;
        let tables = tables_from_result(result, options);
        debug!("Page {}: {} tables detected", image.page_num(), tables.len());
        Ok(tables)
    }
}

// ── Error classification ─────────────────────────────────────────────────

fn transport_error(e: reqwest::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

async fn error_from_response(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, retry_after, &body)
}

/// Map a non-success HTTP status to a [`ClientError`].
pub(crate) fn classify_status(
    status: StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ClientError {
    let detail = error_detail(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        ClientError::RateLimited {
            retry_after_secs,
            detail,
        }
    } else {
        ClientError::Rejected {
            status: status.as_u16(),
            detail,
        }
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

/// Prefer the service's `{"error": {code, message}}` envelope over raw text.
fn error_detail(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return format!("{}: {}", envelope.error.code, envelope.error.message);
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "(empty body)".to_string();
    }
    trimmed.chars().take(MAX_DETAIL_LEN).collect()
}

fn operation_error(error: Option<ServiceError>) -> ClientError {
    let error = error.unwrap_or_default();
    match error.code.as_str() {
        "429" | "TooManyRequests" => ClientError::RateLimited {
            retry_after_secs: None,
            detail: error.message,
        },
        _ => ClientError::AnalysisFailed {
            code: if error.code.is_empty() {
                "unknown".to_string()
            } else {
                error.code
            },
            detail: error.message,
        },
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ServiceError,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
    #[serde(default)]
    tables: Vec<AnalyzedTable>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedPage {
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    content: String,
    span: Span,
    #[serde(default)]
    confidence: Option<f32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Span {
    offset: usize,
    length: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedTable {
    row_count: usize,
    column_count: usize,
    #[serde(default)]
    cells: Vec<AnalyzedCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedCell {
    #[serde(default)]
    kind: Option<String>,
    row_index: usize,
    column_index: usize,
    #[serde(default)]
    row_span: Option<usize>,
    #[serde(default)]
    column_span: Option<usize>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    spans: Vec<Span>,
}

fn cell_kind(kind: Option<&str>) -> CellKind {
    match kind {
        Some("columnHeader") => CellKind::ColumnHeader,
        Some("rowHeader") => CellKind::RowHeader,
        Some("stubHead") => CellKind::StubHead,
        Some("description") => CellKind::Description,
        _ => CellKind::Content,
    }
}

/// Convert the layout result into tables, applying client-side options.
///
/// Words read below `min_confidence` are removed from the cells that hold
/// them. A cell with no scored words keeps the service's text.
fn tables_from_result(result: AnalyzeResult, options: &ExtractionOptions) -> Vec<Table> {
    let threshold = f32::from(options.min_confidence.min(100)) / 100.0;
    let mut words: Vec<&Word> = result
        .pages
        .iter()
        .flat_map(|p| p.words.iter())
        .filter(|w| w.confidence.is_some())
        .collect();
    words.sort_by_key(|w| w.span.offset);

    result
        .tables
        .iter()
        .map(|t| {
            let cells = t
                .cells
                .iter()
                .map(|c| {
                    let inside = words_in_spans(&words, &c.spans);
                    let content = if inside.is_empty() {
                        c.content.clone()
                    } else {
                        keep_confident_words(&c.content, &inside, threshold)
                    };
                    let mut cell = TableCell::new(c.row_index, c.column_index, content)
                        .with_span(c.row_span.unwrap_or(1), c.column_span.unwrap_or(1))
                        .with_kind(cell_kind(c.kind.as_deref()));
                    if let Some(conf) = mean_confidence(&inside) {
                        cell = cell.with_confidence(conf);
                    }
                    cell
                })
                .collect();
            Table::new(t.row_count, t.column_count, cells).apply_options(options)
        })
        .filter(|t| !t.is_blank())
        .collect()
}

/// Scored words starting inside `spans`, in reading order.
fn words_in_spans<'w>(words: &[&'w Word], spans: &[Span]) -> Vec<&'w Word> {
    let mut inside = Vec::new();
    for span in spans {
        let end = span.offset + span.length;
        let first = words.partition_point(|w| w.span.offset < span.offset);
        inside.extend(
            words[first..]
                .iter()
                .take_while(|w| w.span.offset < end)
                .copied(),
        );
    }
    inside
}

/// Rebuild `content` without the words read below `threshold`.
///
/// Words are located in `content` in order, so the line breaks between the
/// words that stay are kept.
fn keep_confident_words(content: &str, words: &[&Word], threshold: f32) -> String {
    let mut kept = String::with_capacity(content.len());
    let mut cursor = 0;
    for word in words.iter().filter(|w| !w.content.is_empty()) {
        let Some(rel) = content[cursor..].find(word.content.as_str()) else {
            continue;
        };
        let start = cursor + rel;
        kept.push_str(&content[cursor..start]);
        if word.confidence.is_some_and(|c| c >= threshold) {
            kept.push_str(&word.content);
        }
        cursor = start + word.content.len();
    }
    kept.push_str(&content[cursor..]);

    kept.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn mean_confidence(words: &[&Word]) -> Option<f32> {
    let scores: Vec<f32> = words.iter().filter_map(|w| w.confidence).collect();
    (!scores.is_empty()).then(|| scores.iter().sum::<f32>() / scores.len() as f32)
}

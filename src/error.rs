//! Error types for the pdf-table-ocr library.
//!
//! Failures fall into three layers:
//!
//! * [`TableOcrError`]: **Fatal**: the run cannot proceed at all (bad input
//!   file, malformed PDF, pdfium unavailable, OCR client not configured).
//!   Returned as `Err(TableOcrError)` from the top-level `extract_tables*`
//!   functions and reported once.
//!
//! * [`ClientError`]: what a [`crate::client::TableExtractionClient`] returns
//!   for one call. It carries a structured kind so the retry loop can branch
//!   on [`ClientError::is_rate_limited`] instead of matching message text.
//!
//! * [`PageError`]: **Non-fatal**: a single page failed (rate limit never
//!   cleared, service rejected the image, scratch file could not be written).
//!   Stored inside [`crate::output::PageOutcome::ExtractionFailed`] so the
//!   remaining pages are still processed and reported.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-table-ocr library.
///
/// Page-level failures use [`PageError`] and are stored in
/// [`crate::output::PageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum TableOcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Input '{source_name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    // ── Rasterization errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' is corrupt: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{source_name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { source_name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{source_name}'")]
    WrongPassword { source_name: String },

    /// The page selection matched no page of the document.
    #[error("No selected page exists (document has {total} pages)")]
    NoPagesSelected { total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install libpdfium system-wide or pass --pdfium-lib /path/to/libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── OCR client errors ─────────────────────────────────────────────────
    /// No table-extraction service was configured.
    #[error("Table extraction client is not configured.\n{hint}")]
    ClientNotConfigured { hint: String },

    // ── Result errors ─────────────────────────────────────────────────────
    /// Some pages were extracted but at least one failed.
    ///
    /// Returned by [`crate::output::ExtractionOutput::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during table extraction")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single table-extraction call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The service is throttling requests (HTTP 429 or equivalent).
    #[error("rate limit exceeded{}: {detail}", retry_hint(.retry_after_secs))]
    RateLimited {
        retry_after_secs: Option<u64>,
        detail: String,
    },

    /// The service answered with a non-retryable status.
    #[error("service rejected the request with HTTP {status}: {detail}")]
    Rejected { status: u16, detail: String },

    /// The analysis operation reported failure.
    #[error("analysis failed ({code}): {detail}")]
    AnalysisFailed { code: String, detail: String },

    /// The request never reached the service or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The asynchronous analysis did not finish in time.
    #[error("analysis did not complete after {polls} status checks")]
    Timeout { polls: u32 },

    /// The page image could not be read from scratch storage.
    #[error("could not read page image: {0}")]
    Image(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl ClientError {
    /// `true` when the failure is a transient capacity limit worth retrying.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::RateLimited { .. })
    }
}

/// A non-fatal error for a single page.
///
/// Stored in [`crate::output::PageOutcome::ExtractionFailed`]. The run
/// always continues with the next page.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Every attempt was rate-limited.
    #[error("Max retries exceeded for the OCR service after {attempts} attempts (last error: {last_error})")]
    RetriesExhausted {
        page: usize,
        attempts: u32,
        last_error: String,
    },

    /// The OCR service failed with a non-retryable error.
    #[error("{detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// The page image could not be materialized for the OCR call.
    #[error("could not prepare page image: {detail}")]
    ScratchFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RetriesExhausted { page, .. }
            | PageError::ExtractionFailed { page, .. }
            | PageError::ScratchFailed { page, .. } => *page,
        }
    }
}

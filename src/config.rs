//! Configuration types for PDF table extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The OCR service credentials live in an
//! explicit [`AzureConfig`] value handed to the client at construction time;
//! nothing in the library reads credentials from the environment.

use crate::error::TableOcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one table-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_table_ocr::{AzureConfig, ExtractionConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .retry_policy(RetryPolicy::new(3, Duration::from_secs(5)))
///     .azure(AzureConfig::new("https://example.cognitiveservices.azure.com", "key"))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Caps either dimension independent of DPI so oversized pages stay within
    /// the OCR service's upload limits.
    pub max_rendered_pixels: u32,

    /// Retry policy applied to rate-limited OCR calls.
    pub retry: RetryPolicy,

    /// Options forwarded to the table-extraction client on every call.
    pub options: ExtractionOptions,

    /// Azure AI Document Intelligence credentials and endpoint.
    pub azure: Option<AzureConfig>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Explicit path to a pdfium shared library. `None` binds the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Directory for per-page scratch images. `None` uses the OS temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Keep a base64 PNG preview of every page in the results. Default: true.
    pub embed_page_images: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-request HTTP timeout for OCR calls in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional observer for per-page and retry events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
            retry: RetryPolicy::default(),
            options: ExtractionOptions::default(),
            azure: None,
            password: None,
            pages: PageSelection::default(),
            pdfium_lib_path: None,
            scratch_dir: None,
            embed_page_images: true,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("retry", &self.retry)
            .field("options", &self.options)
            .field("azure", &self.azure)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pages", &self.pages)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("scratch_dir", &self.scratch_dir)
            .field("embed_page_images", &self.embed_page_images)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n.max(1);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry.delay = delay;
        self
    }

    pub fn options(mut self, options: ExtractionOptions) -> Self {
        self.config.options = options;
        self
    }

    pub fn min_confidence(mut self, pct: u8) -> Self {
        self.config.options.min_confidence = pct.min(100);
        self
    }

    pub fn detect_implicit_rows(mut self, v: bool) -> Self {
        self.config.options.detect_implicit_rows = v;
        self
    }

    pub fn detect_borderless_tables(mut self, v: bool) -> Self {
        self.config.options.detect_borderless_tables = v;
        self
    }

    pub fn azure(mut self, azure: AzureConfig) -> Self {
        self.config.azure = Some(azure);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn embed_page_images(mut self, v: bool) -> Self {
        self.config.embed_page_images = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, TableOcrError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(TableOcrError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.retry.max_attempts == 0 {
            return Err(TableOcrError::InvalidConfig(
                "Retry policy needs at least one attempt".into(),
            ));
        }
        if c.options.min_confidence > 100 {
            return Err(TableOcrError::InvalidConfig(format!(
                "Minimum confidence must be 0–100, got {}",
                c.options.min_confidence
            )));
        }
        if let Some(ref azure) = c.azure {
            azure.validate()?;
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Bounded, fixed-delay retry policy for rate-limited OCR calls.
///
/// Only rate-limit failures consume attempts beyond the first; any other
/// failure ends the call immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always ≥ 1.
    pub max_attempts: u32,
    /// Pause between a rate-limited attempt and the next one.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` is raised to 1 if zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt, no retry.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

// ── Extraction options ───────────────────────────────────────────────────

/// Knobs forwarded to the table-extraction client with every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Split rows whose cells hold several text lines into one row per line.
    pub detect_implicit_rows: bool,
    /// Ask for tables without ruling lines as well.
    ///
    /// `prebuilt-layout` has no such switch and reports both kinds, so the
    /// Azure client ignores this flag.
    pub detect_borderless_tables: bool,
    /// Minimum OCR confidence (0–100) for a cell's text to be kept.
    pub min_confidence: u8,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            detect_implicit_rows: true,
            detect_borderless_tables: false,
            min_confidence: 30,
        }
    }
}

// ── OCR service credentials ──────────────────────────────────────────────

/// Endpoint and credentials for Azure AI Document Intelligence.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://<name>.cognitiveservices.azure.com`.
    pub endpoint: String,
    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    pub api_key: String,
    /// REST API version. Default: `2024-11-30`.
    pub api_version: String,
    /// Analysis model. Default: `prebuilt-layout`.
    pub model_id: String,
    /// Delay between operation status checks in milliseconds. Default: 1000.
    pub poll_interval_ms: u64,
    /// Status checks before the call is abandoned. Default: 120.
    pub max_polls: u32,
}

impl AzureConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            api_version: "2024-11-30".to_string(),
            model_id: "prebuilt-layout".to_string(),
            poll_interval_ms: 1000,
            max_polls: 120,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_model_id(mut self, model: impl Into<String>) -> Self {
        self.model_id = model.into();
        self
    }

    pub fn with_polling(mut self, interval_ms: u64, max_polls: u32) -> Self {
        self.poll_interval_ms = interval_ms;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Check that the endpoint and key are usable.
    pub fn validate(&self) -> Result<(), TableOcrError> {
        if self.api_key.trim().is_empty() {
            return Err(TableOcrError::InvalidConfig(
                "Azure API key is empty".into(),
            ));
        }
        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(TableOcrError::InvalidConfig(format!(
                "Azure endpoint must be an HTTP(S) URL, got '{}'",
                self.endpoint
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("model_id", &self.model_id)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Process all pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

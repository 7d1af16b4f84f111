//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document. This is the hook the
//! presentation layer uses: the CLI draws a progress bar from it, a web
//! front-end could forward the same events over a socket.
//!
//! # Example
//!
//! ```rust
//! use pdf_table_ocr::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TableCounter {
//!     tables: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for TableCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total: usize, table_count: usize) {
//!         self.tables.fetch_add(table_count, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(TableCounter { tables: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events for one page always arrive in the order
/// `on_page_start`, zero or more `on_retry`, then exactly one of
/// `on_page_complete` / `on_page_error`.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after rasterization, before the first page is processed.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a page is about to be shown and sent for extraction.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when an attempt was rate-limited and another one will follow.
    ///
    /// # Arguments
    /// * `attempt`     : the 1-indexed attempt that just failed
    /// * `max_attempts`: the policy's attempt budget
    /// * `delay`       : the pause before the next attempt
    fn on_retry(&self, page_num: usize, attempt: u32, max_attempts: u32, delay: Duration) {
        let _ = (page_num, attempt, max_attempts, delay);
    }

    /// Called when extraction succeeded; `table_count` may be zero.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, table_count: usize) {
        let _ = (page_num, total_pages, table_count);
    }

    /// Called when the page ended in an extraction failure.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

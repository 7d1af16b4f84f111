//! Sequential per-page processing.
//!
//! Pages go through the pipeline one at a time, in document order:
//!
//! ```text
//! present (callback + preview) → materialize → extract (with retry) → release → record
//! ```
//!
//! A failing page is recorded as [`PageOutcome::ExtractionFailed`] and the
//! loop moves on; nothing here can abort the run.

use crate::client::TableExtractionClient;
use crate::config::{ExtractionConfig, ExtractionOptions, RetryPolicy};
use crate::output::{PageOutcome, PageResult};
use crate::pipeline::encode::preview_data_uri;
use crate::pipeline::render::Page;
use crate::pipeline::retry::RetryingExtractor;
use crate::pipeline::scratch::ScratchStore;
use crate::progress::ProgressCallback;
use std::time::Instant;
use tracing::{info, warn};

/// Drives pages through scratch storage and the retrying extractor.
pub struct PageProcessingPipeline<'a, C, S> {
    client: &'a C,
    store: &'a S,
    policy: RetryPolicy,
    options: ExtractionOptions,
    embed_previews: bool,
    callback: Option<ProgressCallback>,
}

impl<'a, C, S> PageProcessingPipeline<'a, C, S>
where
    C: TableExtractionClient,
    S: ScratchStore,
{
    pub fn new(client: &'a C, store: &'a S) -> Self {
        Self {
            client,
            store,
            policy: RetryPolicy::default(),
            options: ExtractionOptions::default(),
            embed_previews: false,
            callback: None,
        }
    }

    /// Pipeline with the policy, options and callback of `config`.
    pub fn from_config(client: &'a C, store: &'a S, config: &ExtractionConfig) -> Self {
        Self::new(client, store)
            .with_policy(config.retry)
            .with_options(config.options)
            .with_previews(config.embed_page_images)
            .with_callback(config.progress_callback.clone())
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    /// Encode a PNG preview of each page into its result.
    pub fn with_previews(mut self, enabled: bool) -> Self {
        self.embed_previews = enabled;
        self
    }

    pub fn with_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Process `pages` in order; one result per page, same order.
    pub async fn process(&self, pages: &[Page]) -> Vec<PageResult> {
        let total = pages.len();
        let mut results = Vec::with_capacity(total);
        for page in pages {
            results.push(self.process_page(page, total).await);
        }
        results
    }

    async fn process_page(&self, page: &Page, total: usize) -> PageResult {
        let start = Instant::now();
        let page_num = page.number;

        if let Some(ref cb) = self.callback {
            cb.on_page_start(page_num, total);
        }
        let preview = if self.embed_previews {
            preview_data_uri(&page.image)
                .map_err(|e| warn!("Page {}: preview encoding failed: {}", page_num, e))
                .ok()
        } else {
            None
        };

        let (outcome, attempts) = match self.store.materialize(page) {
            Ok(image) => {
                let extractor = RetryingExtractor::new(self.client, &self.options)
                    .with_callback(self.callback.as_deref());
                let result = extractor.extract(page_num, &image, &self.policy).await;
                drop(image);
                match result {
                    Ok(extraction) => (
                        PageOutcome::from_tables(extraction.tables),
                        extraction.attempts,
                    ),
                    Err(e) => {
                        let attempts = e.attempts().to_vec();
                        (
                            PageOutcome::ExtractionFailed(e.into_page_error(page_num)),
                            attempts,
                        )
                    }
                }
            }
            Err(e) => (PageOutcome::ExtractionFailed(e), Vec::new()),
        };

        match outcome {
            PageOutcome::ExtractionFailed(ref e) => {
                warn!("Failed to extract tables from page {}: {}", page_num, e);
                if let Some(ref cb) = self.callback {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
            }
            ref found => {
                let count = found.tables().len();
                if count == 0 {
                    info!("No tables detected on page {}.", page_num);
                } else {
                    info!("Page {}: {} tables extracted", page_num, count);
                }
                if let Some(ref cb) = self.callback {
                    cb.on_page_complete(page_num, total, count);
                }
            }
        }

        PageResult {
            page_num,
            outcome,
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
            preview,
        }
    }
}

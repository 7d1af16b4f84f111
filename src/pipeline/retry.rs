//! Bounded retry around a single page's extraction call.
//!
//! ## Retry Strategy
//!
//! Only rate-limit failures are retried, always after the same fixed delay.
//! Any other failure ends the page immediately.
//!
//! The service's `Retry-After` hint is logged but not honoured; a page
//! always waits the policy's delay.

use crate::client::TableExtractionClient;
use crate::config::{ExtractionOptions, RetryPolicy};
use crate::error::{ClientError, PageError};
use crate::output::{AttemptOutcome, ExtractionAttempt};
use crate::pipeline::scratch::MaterializedImage;
use crate::progress::ExtractionProgressCallback;
use crate::table::Table;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// A successful extraction and the calls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Tables found on the page; empty means "no tables".
    pub tables: Vec<Table>,
    pub attempts: Vec<ExtractionAttempt>,
}

/// Why a page's extraction gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryError {
    /// Every attempt was rate limited.
    #[error("rate limited on all {} attempts: {last}", .attempts.len())]
    Exhausted {
        attempts: Vec<ExtractionAttempt>,
        last: ClientError,
    },

    /// A failure that retrying cannot fix.
    #[error("{source}")]
    Permanent {
        attempts: Vec<ExtractionAttempt>,
        source: ClientError,
    },
}

impl RetryError {
    pub fn attempts(&self) -> &[ExtractionAttempt] {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Permanent { attempts, .. } => {
                attempts
            }
        }
    }

    /// Convert into the serializable page-level error.
    pub fn into_page_error(self, page: usize) -> PageError {
        match self {
            RetryError::Exhausted { attempts, last } => PageError::RetriesExhausted {
                page,
                attempts: attempts.len() as u32,
                last_error: last.to_string(),
            },
            RetryError::Permanent { source, .. } => PageError::ExtractionFailed {
                page,
                detail: source.to_string(),
            },
        }
    }
}

/// Runs a client call under a [`RetryPolicy`].
///
/// Stateless between calls: every [`extract`](Self::extract) starts a fresh
/// attempt counter and history.
pub struct RetryingExtractor<'a, C> {
    client: &'a C,
    options: &'a ExtractionOptions,
    callback: Option<&'a dyn ExtractionProgressCallback>,
}

impl<'a, C: TableExtractionClient> RetryingExtractor<'a, C> {
    pub fn new(client: &'a C, options: &'a ExtractionOptions) -> Self {
        Self {
            client,
            options,
            callback: None,
        }
    }

    /// Report retries to `callback` as well as to the log.
    pub fn with_callback(mut self, callback: Option<&'a dyn ExtractionProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Extract the tables of one page image.
    ///
    /// Returns as soon as a call succeeds (with possibly zero tables) or
    /// fails with anything but a rate limit. Rate-limited calls are retried
    /// after `policy.delay` until `policy.max_attempts` calls have been made.
    pub async fn extract(
        &self,
        page_num: usize,
        image: &MaterializedImage,
        policy: &RetryPolicy,
    ) -> Result<Extraction, RetryError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let mut attempt = 1;

        loop {
            match self.client.extract_tables(image, self.options).await {
                Ok(tables) => {
                    let outcome = if tables.is_empty() {
                        AttemptOutcome::NoTables
                    } else {
                        AttemptOutcome::TablesFound(tables.len())
                    };
                    attempts.push(ExtractionAttempt { attempt, outcome });
                    debug!("Page {}: attempt {} succeeded", page_num, attempt);
                    return Ok(Extraction { tables, attempts });
                }
                Err(err) if err.is_rate_limited() => {
                    attempts.push(ExtractionAttempt {
                        attempt,
                        outcome: AttemptOutcome::RateLimited,
                    });

                    if attempt >= max_attempts {
                        warn!(
                            "Page {}: still rate limited after {} attempts, giving up",
                            page_num, attempt
                        );
                        return Err(RetryError::Exhausted {
                            attempts,
                            last: err,
                        });
                    }

                    if let ClientError::RateLimited {
                        retry_after_secs: Some(secs),
                        ..
                    } = &err
                    {
                        debug!("Page {}: service suggested waiting {}s", page_num, secs);
                    }
                    warn!(
                        "Page {}: rate limited (attempt {}/{}), retrying in {:?}",
                        page_num, attempt, max_attempts, policy.delay
                    );
                    if let Some(cb) = self.callback {
                        cb.on_retry(page_num, attempt, max_attempts, policy.delay);
                    }

                    sleep(policy.delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    attempts.push(ExtractionAttempt {
                        attempt,
                        outcome: AttemptOutcome::Failed,
                    });
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt, err);
                    return Err(RetryError::Permanent {
                        attempts,
                        source: err,
                    });
                }
            }
        }
    }
}

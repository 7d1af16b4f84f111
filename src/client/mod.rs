//! Table-extraction clients.
//!
//! [`TableExtractionClient`] is the narrow contract the pipeline consumes:
//! one page image in, zero or more [`Table`]s out, or a [`ClientError`]
//! whose kind says whether the failure is a transient rate limit.
//! [`azure::AzureLayoutClient`] implements it against Azure AI Document
//! Intelligence.

pub mod azure;

use crate::config::ExtractionOptions;
use crate::error::ClientError;
use crate::pipeline::scratch::MaterializedImage;
use crate::table::Table;
use std::future::Future;

pub use azure::AzureLayoutClient;

/// Detects tables on a single page image.
pub trait TableExtractionClient: Send + Sync {
    /// Run one extraction call. An empty `Vec` means the page has no table.
    fn extract_tables(
        &self,
        image: &MaterializedImage,
        options: &ExtractionOptions,
    ) -> impl Future<Output = Result<Vec<Table>, ClientError>> + Send;
}

//! # pdf-table-ocr
//!
//! Extract tables from PDF documents with a cloud OCR service.
//!
//! Each page is rasterised to a PNG and sent to Azure AI Document
//! Intelligence (`prebuilt-layout`), which returns the tables it finds. The
//! results come back per page, so a page the service refuses never costs
//! you the rest of the document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file, URL download, or in-memory bytes
//!  ├─ 2. Render   rasterise selected pages via pdfium (spawn_blocking)
//!  ├─ 3. Scratch  write each page PNG to a temp file for one OCR call
//!  ├─ 4. Extract  OCR call with fixed-delay retry on rate limits
//!  └─ 5. Output   per-page outcomes + stats, HTML report or JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_table_ocr::{extract_tables, AzureConfig, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .azure(AzureConfig::new(
//!             "https://my-resource.cognitiveservices.azure.com",
//!             "my-key",
//!         ))
//!         .build()?;
//!     let output = extract_tables("statement.pdf", &config).await?;
//!     for (page, table) in output.tables() {
//!         println!("page {page}:\n{}", table.to_html(None));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftables` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-table-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{AzureLayoutClient, TableExtractionClient};
pub use config::{
    AzureConfig, ExtractionConfig, ExtractionConfigBuilder, ExtractionOptions, PageSelection,
    RetryPolicy,
};
pub use convert::{
    extract_tables, extract_tables_from_bytes, extract_tables_sync, extract_tables_to_file,
    inspect, run_document,
};
pub use error::{ClientError, PageError, TableOcrError};
pub use output::{
    AttemptOutcome, ExtractionAttempt, ExtractionOutput, ExtractionStats, PageOutcome, PageResult,
};
pub use pipeline::input::Document;
pub use pipeline::process::PageProcessingPipeline;
pub use pipeline::render::{
    DocumentMetadata, Page, PageRasterizer, PdfiumRasterizer, RasterizedDocument,
};
pub use pipeline::retry::{Extraction, RetryError, RetryingExtractor};
pub use pipeline::scratch::{MaterializedImage, ScratchStore, TempFileStore};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use table::{CellKind, Table, TableCell};

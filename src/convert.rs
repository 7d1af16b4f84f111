//! Run-level entry points.
//!
//! [`run_document`] is the generic core: rasterize, walk the pages through
//! [`PageProcessingPipeline`], then total up the statistics. The other
//! functions resolve the input and wire in the default backends (pdfium,
//! Azure Document Intelligence, temp-file scratch storage).

use crate::client::{AzureLayoutClient, TableExtractionClient};
use crate::config::ExtractionConfig;
use crate::error::TableOcrError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::input::{self, Document};
use crate::pipeline::process::PageProcessingPipeline;
use crate::pipeline::render::{DocumentMetadata, PageRasterizer, PdfiumRasterizer};
use crate::pipeline::scratch::{ScratchStore, TempFileStore};
use crate::report;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Extract tables from a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`: Local file path or HTTP/HTTPS URL to a PDF
/// * `config`: Extraction configuration; `config.azure` must be set
///
/// # Returns
/// `Ok(ExtractionOutput)` once every selected page has been attempted, even
/// if some pages failed (check `output.stats.failed_pages`, or call
/// [`ExtractionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(TableOcrError)` only for fatal errors:
/// - File not found, download failure, not a PDF
/// - Missing Azure credentials
/// - Any rasterization failure (corrupt PDF, wrong password, pdfium missing)
pub async fn extract_tables(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TableOcrError> {
    let input_str = input_str.as_ref();
    info!("Starting table extraction: {}", input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run_with_default_backends(&document, config).await
}

/// Extract tables from PDF bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use pdf_table_ocr::{extract_tables_from_bytes, AzureConfig, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("invoice.pdf")?;
/// let config = ExtractionConfig::builder()
///     .azure(AzureConfig::new("https://example.cognitiveservices.azure.com", "key"))
///     .build()?;
/// let output = extract_tables_from_bytes(bytes, &config).await?;
/// println!("{} tables", output.stats.total_tables);
/// # Ok(())
/// # }
/// ```
pub async fn extract_tables_from_bytes(
    bytes: impl Into<Vec<u8>>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TableOcrError> {
    let document = Document::from_bytes("<memory>", bytes.into())?;
    run_with_default_backends(&document, config).await
}

/// Extract tables and write the HTML report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_tables_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, TableOcrError> {
    let output = extract_tables(input_str, config).await?;
    let html = report::render_html(&output, &output.source);
    write_output(output_path.as_ref(), &html).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract_tables`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_tables_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TableOcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TableOcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_tables(input_str, config))
}

/// Read PDF metadata without rendering or calling the OCR service.
///
/// Only the download timeout, password and pdfium library path of `config`
/// are used; no credentials are needed.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, TableOcrError> {
    let document = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    PdfiumRasterizer::from_config(config)
        .metadata(&document)
        .await
}

/// Run one document through explicit backends.
///
/// Rasterization errors are fatal and returned as-is; page-level failures
/// end up in the returned pages.
pub async fn run_document<R, C, S>(
    document: &Document,
    rasterizer: &R,
    client: &C,
    store: &S,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TableOcrError>
where
    R: PageRasterizer,
    C: TableExtractionClient,
    S: ScratchStore,
{
    let total_start = Instant::now();

    // ── Step 1: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let rasterized = rasterizer.rasterize(document, &config.pages).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rendered {} of {} pages in {}ms",
        rasterized.pages.len(),
        rasterized.total_pages,
        render_duration_ms
    );

    let selected = rasterized.pages.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(selected);
    }

    // ── Step 2: Extract tables page by page ──────────────────────────────
    let extraction_start = Instant::now();
    let pipeline = PageProcessingPipeline::from_config(client, store, config);
    let pages = pipeline.process(&rasterized.pages).await;
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;

    // ── Step 3: Compute stats ────────────────────────────────────────────
    let stats = ExtractionStats {
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        extraction_duration_ms,
        ..ExtractionStats::tally(rasterized.total_pages, &pages)
    };

    info!(
        "Extraction complete: {} tables on {}/{} pages, {} failed, {}ms total",
        stats.total_tables,
        stats.pages_with_tables,
        stats.processed_pages,
        stats.failed_pages,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(selected, selected - stats.failed_pages);
    }

    Ok(ExtractionOutput {
        source: document.source().to_string(),
        pages,
        stats,
    })
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub async fn write_output(path: &Path, contents: &str) -> Result<(), TableOcrError> {
    let write_err = |source| TableOcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_with_default_backends(
    document: &Document,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TableOcrError> {
    // Credentials are checked before any page is rendered.
    let client = AzureLayoutClient::from_config(config)?;
    let rasterizer = PdfiumRasterizer::from_config(config);
    let store = TempFileStore::from_dir(config.scratch_dir.clone());
    run_document(document, &rasterizer, &client, &store, config).await
}

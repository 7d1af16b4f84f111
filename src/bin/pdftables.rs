//! CLI binary for pdf-table-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and writes the report.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_table_ocr::convert::write_output;
use pdf_table_ocr::report::render_html;
use pdf_table_ocr::{
    extract_tables, inspect, AzureConfig, ExtractionConfig, ExtractionProgressCallback,
    PageSelection, ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// page and per rate-limit retry.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_extraction_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_retry(&self, page_num: usize, attempt: u32, max_attempts: u32, delay: Duration) {
        self.bar.println(format!(
            "  {} Page {:>3}  {}",
            yellow("↻"),
            page_num,
            yellow(&format!(
                "rate limited (attempt {attempt}/{max_attempts}), retrying in {:.1}s",
                delay.as_secs_f64()
            )),
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, table_count: usize) {
        let secs = self.elapsed_secs(page_num);
        let label = match table_count {
            0 => "no tables".to_string(),
            1 => "1 table".to_string(),
            n => format!("{n} tables"),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&label),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages processed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages processed  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every table into an HTML report
  pdftables statement.pdf -o statement.html

  # Specific pages, higher resolution
  pdftables --pages 2-4 --dpi 300 annual-report.pdf -o tables.html

  # Structured JSON on stdout
  pdftables --json invoice.pdf > invoice.json

  # Extract from a URL
  pdftables https://example.com/prices.pdf -o prices.html

  # Be patient with a throttled free-tier resource
  pdftables --max-attempts 5 --retry-delay 20 scan.pdf -o scan.html

  # Inspect PDF metadata (no credentials needed)
  pdftables --inspect-only document.pdf

ENVIRONMENT VARIABLES:
  AZURE_DI_ENDPOINT   Azure AI Document Intelligence endpoint URL
  AZURE_DI_KEY        Azure AI Document Intelligence API key
  PDFIUM_LIB_PATH     Path to a pdfium shared library
  RUST_LOG            Override the log filter (e.g. pdf_table_ocr=debug)

SETUP:
  1. Create a Document Intelligence resource in the Azure portal.
  2. export AZURE_DI_ENDPOINT=https://<resource>.cognitiveservices.azure.com
     export AZURE_DI_KEY=<key>
  3. pdftables document.pdf -o tables.html
"#;

/// Extract tables from PDF pages with Azure AI Document Intelligence.
#[derive(Parser, Debug)]
#[command(
    name = "pdftables",
    version,
    about = "Extract tables from PDF files and URLs with a cloud OCR service",
    long_about = "Render every page of a PDF, send it to Azure AI Document Intelligence \
(prebuilt-layout) and collect the detected tables into an HTML report. Rate-limited calls \
are retried after a fixed delay; a page that still fails is reported and skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the report to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Azure AI Document Intelligence endpoint.
    #[arg(long, env = "AZURE_DI_ENDPOINT")]
    endpoint: Option<String>,

    /// Azure AI Document Intelligence API key.
    #[arg(long, env = "AZURE_DI_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Document Intelligence REST API version.
    #[arg(long, default_value = "2024-11-30")]
    api_version: String,

    /// Analysis model ID.
    #[arg(long, default_value = "prebuilt-layout")]
    model_id: String,

    /// Rendering DPI (72–600).
    #[arg(long, default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, default_value = "all")]
    pages: String,

    /// PDF user password for encrypted documents.
    #[arg(long)]
    password: Option<String>,

    /// OCR calls per page before a rate limit becomes a page failure.
    #[arg(long, default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Seconds to wait after a rate-limited call.
    #[arg(long, default_value_t = 5)]
    retry_delay: u64,

    /// Blank out cells read with less than this confidence (0–100).
    #[arg(long, default_value_t = 30,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    min_confidence: u8,

    /// Keep multi-line cells in a single row.
    #[arg(long)]
    no_implicit_rows: bool,

    /// Ask for tables without ruling lines as well. No effect with Azure
    /// prebuilt-layout, which always reports them.
    #[arg(long)]
    borderless_tables: bool,

    /// Output structured JSON (ExtractionOutput) instead of HTML.
    #[arg(long)]
    json: bool,

    /// Leave page images out of the HTML report.
    #[arg(long)]
    no_images: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Path to a pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Directory for per-page scratch images.
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Per-request OCR timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// Exit with an error when any page failed.
    #[arg(long)]
    strict: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the bar; keep them quiet
    // while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = build_config(&cli, None)?;
        let meta = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract_tables(&cli.input, &config)
        .await
        .context("Table extraction failed")?;

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        render_html(&output, &report_title(&cli.input))
    };

    match cli.output {
        Some(ref path) => {
            write_output(path, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            if !rendered.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    // ── Summary ──────────────────────────────────────────────────────────
    let stats = &output.stats;
    if !cli.quiet {
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {} tables on {}/{} pages  {} failed  {}ms{}",
            if stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.total_tables,
            stats.pages_with_tables,
            stats.processed_pages,
            stats.failed_pages,
            stats.total_duration_ms,
            target,
        );
        if stats.total_attempts > stats.processed_pages {
            eprintln!(
                "   {}",
                dim(&format!(
                    "{} OCR calls ({} retries)",
                    stats.total_attempts,
                    stats.total_attempts - stats.processed_pages
                ))
            );
        }
    }

    if cli.strict {
        output
            .into_result()
            .context("Some pages could not be processed")?;
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .pages(pages)
        .max_attempts(cli.max_attempts)
        .retry_delay(Duration::from_secs(cli.retry_delay))
        .min_confidence(cli.min_confidence)
        .detect_implicit_rows(!cli.no_implicit_rows)
        .detect_borderless_tables(cli.borderless_tables)
        .embed_page_images(!cli.no_images && !cli.json)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    // Credentials are optional here so --inspect-only works without them;
    // extraction reports the missing client itself.
    if let (Some(endpoint), Some(key)) = (cli.endpoint.as_deref(), cli.api_key.as_deref()) {
        builder = builder.azure(
            AzureConfig::new(endpoint, key)
                .with_api_version(cli.api_version.as_str())
                .with_model_id(cli.model_id.as_str()),
        );
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.as_str());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Report heading: the file name of the input, or the URL as given.
fn report_title(input: &str) -> String {
    if input.starts_with("http://") || input.starts_with("https://") {
        return input.to_string();
    }
    PathBuf::from(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start
            .trim()
            .parse()
            .context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!(
                "Invalid page range '{}-{}': start must be <= end",
                start,
                end
            );
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(&p) = pages.iter().find(|&&p| p < 1) {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}

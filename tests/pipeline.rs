//! Integration tests for the page-processing pipeline.
//!
//! The rasterizer and OCR client are replaced by in-memory fakes, so these
//! tests need neither pdfium nor network access. Scratch files are real
//! temp files in a per-test directory.

use image::{DynamicImage, Rgba, RgbaImage};
use pdf_table_ocr::{
    run_document, AttemptOutcome, ClientError, Document, ExtractionConfig, ExtractionOptions,
    ExtractionProgressCallback, MaterializedImage, Page, PageError, PageOutcome,
    PageProcessingPipeline, PageRasterizer, PageSelection, RasterizedDocument, RetryPolicy,
    ScratchStore, Table, TableExtractionClient, TableOcrError, TempFileStore,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ────────────────────────────────────────────────────────────────────

fn page(number: usize) -> Page {
    Page {
        number,
        image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]))),
    }
}

fn pages(k: usize) -> Vec<Page> {
    (1..=k).map(page).collect()
}

fn rate_limited() -> ClientError {
    ClientError::RateLimited {
        retry_after_secs: None,
        detail: "429: Too many requests".into(),
    }
}

fn tables(n: usize) -> Vec<Table> {
    (0..n)
        .map(|i| Table::from_rows([[format!("t{i}"), "v".to_string()]]))
        .collect()
}

type Response = Result<Vec<Table>, ClientError>;

/// Per-page scripted responses; the last response of a script repeats.
#[derive(Default)]
struct PageScriptedClient {
    scripts: Mutex<HashMap<usize, VecDeque<Response>>>,
    repeat: Mutex<HashMap<usize, Response>>,
    calls: Mutex<Vec<usize>>,
    /// Paths seen by the client, to check the scratch file existed during the call.
    seen_paths: Mutex<Vec<(PathBuf, bool)>>,
}

impl PageScriptedClient {
    fn script(self, page: usize, responses: Vec<Response>) -> Self {
        if let Some(last) = responses.last().cloned() {
            self.repeat.lock().unwrap().insert(page, last);
        }
        self.scripts
            .lock()
            .unwrap()
            .insert(page, responses.into());
        self
    }

    fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl TableExtractionClient for PageScriptedClient {
    async fn extract_tables(
        &self,
        image: &MaterializedImage,
        _options: &ExtractionOptions,
    ) -> Result<Vec<Table>, ClientError> {
        let page = image.page_num();
        self.calls.lock().unwrap().push(page);
        self.seen_paths
            .lock()
            .unwrap()
            .push((image.path().to_path_buf(), image.path().exists()));

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(|q| q.pop_front());
        match next {
            Some(r) => r,
            None => self
                .repeat
                .lock()
                .unwrap()
                .get(&page)
                .cloned()
                .unwrap_or(Ok(vec![])),
        }
    }
}

/// Scratch store that counts acquisitions and remembers every path it made.
struct CountingStore {
    inner: TempFileStore,
    acquired: Mutex<Vec<(usize, PathBuf)>>,
    fail_on: Option<usize>,
}

impl CountingStore {
    fn new(dir: &std::path::Path) -> Self {
        Self {
            inner: TempFileStore::in_dir(dir),
            acquired: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }
}

impl ScratchStore for CountingStore {
    fn materialize(&self, page: &Page) -> Result<MaterializedImage, PageError> {
        if self.fail_on == Some(page.number) {
            return Err(PageError::ScratchFailed {
                page: page.number,
                detail: "disk full".into(),
            });
        }
        let image = self.inner.materialize(page)?;
        self.acquired
            .lock()
            .unwrap()
            .push((page.number, image.path().to_path_buf()));
        Ok(image)
    }
}

/// Rasterizer that hands back pre-built pages, or a fixed fatal error.
struct FakeRasterizer {
    total_pages: usize,
    fail: bool,
}

impl PageRasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        document: &Document,
        selection: &PageSelection,
    ) -> Result<RasterizedDocument, TableOcrError> {
        if self.fail {
            return Err(TableOcrError::CorruptPdf {
                source_name: document.source().to_string(),
                detail: "xref table missing".into(),
            });
        }
        let pages = selection
            .to_indices(self.total_pages)
            .into_iter()
            .map(|i| page(i + 1))
            .collect();
        Ok(RasterizedDocument {
            total_pages: self.total_pages,
            pages,
        })
    }
}

#[derive(Default)]
struct EventLog(Mutex<Vec<String>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ExtractionProgressCallback for EventLog {
    fn on_extraction_start(&self, total_pages: usize) {
        self.0.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.0.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_retry(&self, page_num: usize, attempt: u32, max_attempts: u32, _delay: Duration) {
        self.0
            .lock()
            .unwrap()
            .push(format!("retry {page_num} {attempt}/{max_attempts}"));
    }
    fn on_page_complete(&self, page_num: usize, _total: usize, table_count: usize) {
        self.0
            .lock()
            .unwrap()
            .push(format!("done {page_num} {table_count}"));
    }
    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.0.lock().unwrap().push(format!("error {page_num}"));
    }
    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        self.0
            .lock()
            .unwrap()
            .push(format!("complete {success_count}/{total_pages}"));
    }
}

fn pdf() -> Document {
    Document::from_bytes("fixture.pdf", b"%PDF-1.7\n%%EOF".to_vec()).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_scenario_outcomes_and_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default()
        .script(1, vec![Ok(tables(2))])
        .script(2, vec![Ok(vec![])])
        .script(3, vec![Err(rate_limited()), Err(rate_limited()), Ok(tables(1))]);

    let pipeline = PageProcessingPipeline::new(&client, &store)
        .with_policy(RetryPolicy::new(3, Duration::ZERO));
    let results = pipeline.process(&pages(3)).await;

    let outcomes: Vec<&PageOutcome> = results.iter().map(|r| &r.outcome).collect();
    assert!(matches!(outcomes[0], PageOutcome::TablesFound(t) if t.len() == 2));
    assert_eq!(outcomes[1], &PageOutcome::NoTablesFound);
    assert!(matches!(outcomes[2], PageOutcome::TablesFound(t) if t.len() == 1));

    assert_eq!(client.calls(), vec![1, 2, 3, 3, 3]);
    let total: usize = results.iter().map(|r| r.attempts.len()).sum();
    assert_eq!(total, 5);
    assert_eq!(
        results[2]
            .attempts
            .iter()
            .map(|a| a.outcome)
            .collect::<Vec<_>>(),
        vec![
            AttemptOutcome::RateLimited,
            AttemptOutcome::RateLimited,
            AttemptOutcome::TablesFound(1)
        ]
    );
}

#[tokio::test]
async fn one_failing_page_does_not_affect_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default()
        .script(1, vec![Ok(tables(1))])
        .script(
            2,
            vec![Err(ClientError::Rejected {
                status: 400,
                detail: "InvalidImage".into(),
            })],
        )
        .script(3, vec![Ok(vec![])])
        .script(4, vec![Ok(tables(3))]);

    let results = PageProcessingPipeline::new(&client, &store)
        .with_policy(RetryPolicy::new(3, Duration::ZERO))
        .process(&pages(4))
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(
        results.iter().map(|r| r.page_num).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert!(!results[0].outcome.is_failure());
    assert_eq!(
        results[1].outcome,
        PageOutcome::ExtractionFailed(PageError::ExtractionFailed {
            page: 2,
            detail: "service rejected the request with HTTP 400: InvalidImage".into(),
        })
    );
    assert_eq!(results[1].attempts.len(), 1);
    assert_eq!(results[2].outcome, PageOutcome::NoTablesFound);
    assert_eq!(results[3].outcome.tables().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_become_a_page_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default()
        .script(1, vec![Err(rate_limited())])
        .script(2, vec![Ok(tables(1))]);

    let results = PageProcessingPipeline::new(&client, &store)
        .with_policy(RetryPolicy::new(2, Duration::ZERO))
        .process(&pages(2))
        .await;

    assert_eq!(
        results[0].outcome,
        PageOutcome::ExtractionFailed(PageError::RetriesExhausted {
            page: 1,
            attempts: 2,
            last_error: rate_limited().to_string(),
        })
    );
    assert!(matches!(results[1].outcome, PageOutcome::TablesFound(_)));
}

#[tokio::test]
async fn scratch_file_acquired_once_and_released_on_every_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default()
        .script(1, vec![Ok(tables(1))])
        .script(2, vec![Err(rate_limited())])
        .script(
            3,
            vec![Err(ClientError::AnalysisFailed {
                code: "InternalServerError".into(),
                detail: "boom".into(),
            })],
        );

    PageProcessingPipeline::new(&client, &store)
        .with_policy(RetryPolicy::new(3, Duration::ZERO))
        .process(&pages(3))
        .await;

    let acquired = store.acquired.lock().unwrap().clone();
    assert_eq!(
        acquired.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
        vec![1, 2, 3],
        "one acquisition per page, retries reuse it"
    );
    for (page, path) in &acquired {
        assert!(!path.exists(), "scratch file of page {page} was not released");
    }

    // Every retry of page 2 read the same, still-present file.
    let seen = client.seen_paths.lock().unwrap().clone();
    assert_eq!(seen.len(), 5);
    assert!(seen.iter().all(|(_, existed)| *existed));
    assert!(seen[1..4].iter().all(|(p, _)| p == &acquired[1].1));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn scratch_failure_is_recorded_without_calling_the_client() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CountingStore::new(dir.path());
    store.fail_on = Some(2);
    let client = PageScriptedClient::default();

    let results = PageProcessingPipeline::new(&client, &store)
        .process(&pages(3))
        .await;

    assert_eq!(client.calls(), vec![1, 3]);
    assert!(matches!(
        results[1].outcome,
        PageOutcome::ExtractionFailed(PageError::ScratchFailed { page: 2, .. })
    ));
    assert!(results[1].attempts.is_empty());
}

#[tokio::test]
async fn callbacks_follow_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default()
        .script(1, vec![Err(rate_limited()), Ok(tables(2))])
        .script(2, vec![Err(ClientError::Transport("connection reset".into()))]);
    let log = Arc::new(EventLog::default());

    let config = ExtractionConfig::builder()
        .retry_policy(RetryPolicy::new(3, Duration::ZERO))
        .embed_page_images(false)
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let rasterizer = FakeRasterizer {
        total_pages: 2,
        fail: false,
    };

    let output = run_document(&pdf(), &rasterizer, &client, &store, &config)
        .await
        .unwrap();

    assert_eq!(
        log.events(),
        vec![
            "start 2",
            "page 1",
            "retry 1 1/3",
            "done 1 2",
            "page 2",
            "error 2",
            "complete 1/2",
        ]
    );
    assert_eq!(output.source, "fixture.pdf");
    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.stats.total_attempts, 3);
    assert!(matches!(
        output.into_result(),
        Err(TableOcrError::PartialFailure {
            success: 1,
            failed: 1,
            total: 2
        })
    ));
}

#[tokio::test]
async fn page_selection_and_previews_flow_through_run_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default();
    let config = ExtractionConfig::builder()
        .pages(PageSelection::Set(vec![2, 4]))
        .build()
        .unwrap();
    let rasterizer = FakeRasterizer {
        total_pages: 5,
        fail: false,
    };

    let output = run_document(&pdf(), &rasterizer, &client, &store, &config)
        .await
        .unwrap();

    assert_eq!(
        output.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![2, 4]
    );
    assert_eq!(output.stats.total_pages, 5);
    assert_eq!(output.stats.processed_pages, 2);
    assert_eq!(output.stats.empty_pages, 2);
    assert!(output
        .pages
        .iter()
        .all(|p| p.preview.as_deref().is_some_and(|u| u.starts_with("data:image/png;base64,"))));
}

#[tokio::test]
async fn rasterization_failure_is_fatal_and_skips_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default();
    let rasterizer = FakeRasterizer {
        total_pages: 3,
        fail: true,
    };

    let err = run_document(
        &pdf(),
        &rasterizer,
        &client,
        &store,
        &ExtractionConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, TableOcrError::CorruptPdf { .. }));
    assert!(client.calls().is_empty());
    assert!(store.acquired.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rate_limit_pauses_use_the_fixed_delay() {
    let dir = tempfile::tempdir().unwrap();
    let store = CountingStore::new(dir.path());
    let client = PageScriptedClient::default().script(1, vec![Err(rate_limited())]);

    let start = tokio::time::Instant::now();
    let results = PageProcessingPipeline::new(&client, &store)
        .with_policy(RetryPolicy::new(3, Duration::from_secs(10)))
        .process(&pages(1))
        .await;
    let elapsed = start.elapsed();

    assert_eq!(results[0].attempts.len(), 3);
    assert!(
        elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21),
        "expected two 10s pauses, got {elapsed:?}"
    );
}

//! Integration tests for the full conversion pipeline.
//!
//! These run against a deterministic in-process renderer, so they need
//! neither pdfium nor real PDF content. Completion order is deliberately
//! scrambled by per-page delays to exercise sequencing.

use edgequake_pdf2img::pipeline::render::RenderError;
use edgequake_pdf2img::pipeline::tasks::RenderTask;
use edgequake_pdf2img::{
    convert_stream_with, convert_with, inspect_with, ConfigWarning, ConversionConfig,
    ConversionOutput, ConversionProgressCallback, DocumentMetadata, ImageFormat, PageError,
    PageRenderer, Pdf2ImgError, RenderedPage, RunState,
};
use flate2::read::GzDecoder;
use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Renders `pages` pages as `"<format> page <n> @ <dpi>"`.
struct FakeRenderer {
    pages: usize,
    corrupt: HashSet<usize>,
    panics: HashSet<usize>,
    stalls: HashSet<usize>,
    renders: AtomicUsize,
    opens: AtomicUsize,
}

impl FakeRenderer {
    fn new(pages: usize) -> Self {
        Self {
            pages,
            corrupt: HashSet::new(),
            panics: HashSet::new(),
            stalls: HashSet::new(),
            renders: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }

    /// 1-based page numbers that fail to render.
    fn corrupt(mut self, pages: &[usize]) -> Self {
        self.corrupt = pages.iter().map(|p| p - 1).collect();
        self
    }

    fn panics(mut self, pages: &[usize]) -> Self {
        self.panics = pages.iter().map(|p| p - 1).collect();
        self
    }

    fn stalls(mut self, pages: &[usize]) -> Self {
        self.stalls = pages.iter().map(|p| p - 1).collect();
        self
    }
}

impl PageRenderer for FakeRenderer {
    fn open_metadata(&self, _: &Path, _: Option<&str>) -> Result<DocumentMetadata, RenderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(DocumentMetadata {
            page_count: self.pages,
            pdf_version: "1.7".into(),
            ..Default::default()
        })
    }

    fn render_page(&self, task: &RenderTask) -> Result<RenderedPage, RenderError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let idx = task.page_index;

        // Later pages tend to finish first.
        std::thread::sleep(Duration::from_millis(((self.pages - idx) % 4) as u64 * 5));

        if self.stalls.contains(&idx) {
            std::thread::sleep(Duration::from_millis(2_500));
        }
        if self.panics.contains(&idx) {
            panic!("renderer crashed on page {}", idx + 1);
        }
        if self.corrupt.contains(&idx) {
            return Err(RenderError::Page(format!("invalid content stream on page {}", idx + 1)));
        }

        let format = task.params.format;
        Ok(RenderedPage {
            bytes: format!("{} page {} @ {}", format, idx + 1, task.params.dpi).into_bytes(),
            format,
            width: 10,
            height: 10,
        })
    }
}

/// A scratch directory holding `report.pdf` (only the magic matters).
struct Fixture {
    _dir: tempfile::TempDir,
    pdf: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report.pdf");
        std::fs::write(&pdf, b"%PDF-1.7\n%fake body\n").unwrap();
        Self { _dir: dir, pdf }
    }

    fn dir(&self) -> &Path {
        self.pdf.parent().unwrap()
    }

    fn out(&self, name: &str) -> PathBuf {
        self.dir().join(name)
    }

    fn archive(&self) -> PathBuf {
        self.dir().join("report_images.tar.gz")
    }
}

fn config(out: &Path, workers: usize) -> ConversionConfig {
    ConversionConfig::builder()
        .output_dir(out)
        .workers(workers)
        .build()
        .unwrap()
}

fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn archive_members(archive: &Path) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let file = std::fs::File::open(archive).unwrap();
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.entries()
        .unwrap()
        .map(|e| {
            let mut e = e.unwrap();
            let name = e.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            e.read_to_end(&mut data).unwrap();
            (name, data)
        })
        .collect()
}

fn written_names(output: &ConversionOutput) -> Vec<String> {
    output
        .files
        .iter()
        .map(|f| f.file_name().to_string_lossy().into_owned())
        .collect()
}

// ── Ordering and determinism ─────────────────────────────────────────────────

#[tokio::test]
async fn test_output_order_holds_for_every_worker_count() {
    let fx = Fixture::new();
    let expected: Vec<String> = (1..=6).map(|n| format!("page_{n:03}.jpg")).collect();

    for workers in 1..=6 {
        let out = fx.out(&format!("w{workers}"));
        let renderer = Arc::new(FakeRenderer::new(6));
        let output = convert_with(&fx.pdf, &config(&out, workers), renderer)
            .await
            .unwrap();

        assert_eq!(written_names(&output), expected, "workers = {workers}");
        assert_eq!(dir_listing(&out), expected, "workers = {workers}");
        for (i, file) in output.files.iter().enumerate() {
            assert_eq!(file.page_index, i);
            let body = std::fs::read_to_string(&file.path).unwrap();
            assert_eq!(body, format!("JPEG page {} @ 150", i + 1));
        }
        assert_eq!(output.stats.workers, workers);
        assert_eq!(output.archive_state, RunState::Archived);
        assert_eq!(output.state, RunState::Done);
    }
}

#[tokio::test]
async fn test_repeated_runs_are_byte_identical() {
    let fx = Fixture::new();

    let first = convert_with(&fx.pdf, &config(&fx.out("a"), 3), Arc::new(FakeRenderer::new(5)))
        .await
        .unwrap();
    let archive_a = std::fs::read(first.archive.as_ref().unwrap()).unwrap();

    let second = convert_with(&fx.pdf, &config(&fx.out("b"), 3), Arc::new(FakeRenderer::new(5)))
        .await
        .unwrap();
    let archive_b = std::fs::read(second.archive.as_ref().unwrap()).unwrap();

    assert_eq!(written_names(&first), written_names(&second));
    for (a, b) in first.files.iter().zip(&second.files) {
        assert_eq!(std::fs::read(&a.path).unwrap(), std::fs::read(&b.path).unwrap());
    }
    assert_eq!(archive_a, archive_b);
}

#[tokio::test]
async fn test_single_worker_matches_many_workers() {
    let fx = Fixture::new();
    let serial = convert_with(
        &fx.pdf,
        &config(&fx.out("serial"), 1),
        Arc::new(FakeRenderer::new(7).corrupt(&[4])),
    )
    .await
    .unwrap();
    let parallel = convert_with(
        &fx.pdf,
        &config(&fx.out("parallel"), 7),
        Arc::new(FakeRenderer::new(7).corrupt(&[4])),
    )
    .await
    .unwrap();

    assert_eq!(written_names(&serial), written_names(&parallel));
    assert_eq!(serial.failed_pages(), parallel.failed_pages());
    for (a, b) in serial.files.iter().zip(&parallel.files) {
        assert_eq!(std::fs::read(&a.path).unwrap(), std::fs::read(&b.path).unwrap());
    }
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_corrupt_page_is_skipped_and_reported() {
    let fx = Fixture::new();
    let out = fx.out("pages");
    let output = convert_with(&fx.pdf, &config(&out, 4), Arc::new(FakeRenderer::new(5).corrupt(&[3])))
        .await
        .unwrap();

    assert_eq!(
        dir_listing(&out),
        vec!["page_001.jpg", "page_002.jpg", "page_004.jpg", "page_005.jpg"]
    );
    assert_eq!(output.failed_pages(), vec![3]);
    assert!(matches!(output.failures[0], PageError::RenderFailed { page: 3, .. }));
    assert_eq!(output.stats.processed_pages, 4);
    assert_eq!(output.stats.failed_pages, 1);
    assert_ok!(output.check());
}

#[tokio::test]
async fn test_panicking_page_does_not_abort_run() {
    let fx = Fixture::new();
    let output = convert_with(
        &fx.pdf,
        &config(&fx.out("pages"), 3),
        Arc::new(FakeRenderer::new(4).panics(&[2])),
    )
    .await
    .unwrap();

    assert_eq!(output.files.len(), 3);
    match &output.failures[..] {
        [PageError::Panicked { page: 2, detail }] => {
            assert!(detail.contains("renderer crashed on page 2"), "{detail}");
        }
        other => panic!("unexpected failures: {other:?}"),
    }
}

#[tokio::test]
async fn test_stalled_page_times_out() {
    let fx = Fixture::new();
    let config = ConversionConfig::builder()
        .output_dir(fx.out("pages"))
        .workers(3)
        .page_timeout_secs(1)
        .build()
        .unwrap();
    let output = convert_with(&fx.pdf, &config, Arc::new(FakeRenderer::new(3).stalls(&[2])))
        .await
        .unwrap();

    assert_eq!(written_names(&output), vec!["page_001.jpg", "page_003.jpg"]);
    assert!(matches!(
        output.failures[..],
        [PageError::Timeout { page: 2, limit_ms: 1_000 }]
    ));
}

#[tokio::test]
async fn test_all_pages_failing_is_reported_by_check() {
    let fx = Fixture::new();
    let out = fx.out("pages");
    let output = convert_with(
        &fx.pdf,
        &config(&out, 2),
        Arc::new(FakeRenderer::new(2).corrupt(&[1, 2])),
    )
    .await
    .unwrap();

    assert!(output.files.is_empty());
    assert!(output.archive.is_none());
    assert!(!fx.archive().exists());
    assert_eq!(output.archive_state, RunState::ArchiveSkipped);
    assert_eq!(output.state, RunState::Done);
    let err = assert_err!(output.check());
    assert!(matches!(err, Pdf2ImgError::AllPagesFailed { total: 2, .. }));
}

// ── Archive ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_archive_mirrors_output_directory() {
    let fx = Fixture::new();
    let out = fx.out("pages");
    let config = ConversionConfig::builder()
        .output_dir(&out)
        .format(ImageFormat::Png)
        .workers(4)
        .build()
        .unwrap();
    let output = convert_with(&fx.pdf, &config, Arc::new(FakeRenderer::new(5).corrupt(&[2])))
        .await
        .unwrap();

    assert_eq!(output.archive.as_deref(), Some(fx.archive().as_path()));
    let members = archive_members(&fx.archive());
    let names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["page_001.png", "page_003.png", "page_004.png", "page_005.png"]);
    for (name, data) in &members {
        assert_eq!(&std::fs::read(out.join(name)).unwrap(), data);
    }
    // Page files are kept after archiving.
    assert_eq!(dir_listing(&out).len(), 4);
}

#[tokio::test]
async fn test_no_archive_when_disabled() {
    let fx = Fixture::new();
    let config = ConversionConfig::builder()
        .output_dir(fx.out("pages"))
        .create_archive(false)
        .build()
        .unwrap();
    let output = convert_with(&fx.pdf, &config, Arc::new(FakeRenderer::new(2)))
        .await
        .unwrap();

    assert!(output.archive.is_none());
    assert!(!fx.archive().exists());
    assert_eq!(output.archive_state, RunState::ArchiveSkipped);
    assert_eq!(output.state, RunState::Done);
}

#[tokio::test]
async fn test_archive_failure_keeps_pages_and_succeeds() {
    let fx = Fixture::new();
    let out = fx.out("pages");
    // A directory where the archive should go makes the final rename fail.
    std::fs::create_dir(fx.archive()).unwrap();

    let output = convert_with(&fx.pdf, &config(&out, 2), Arc::new(FakeRenderer::new(3)))
        .await
        .unwrap();

    assert!(output.archive.is_none());
    let reason = output.archive_error.as_deref().unwrap();
    assert!(reason.contains("report_images.tar.gz"), "{reason}");
    assert_eq!(output.archive_state, RunState::ArchiveSkipped);
    assert_eq!(output.state, RunState::Done);
    assert_eq!(
        dir_listing(&out),
        vec!["page_001.jpg", "page_002.jpg", "page_003.jpg"]
    );
    assert!(fx.archive().is_dir());
    assert!(!fx.dir().join("report_images.tar.gz.partial").exists());
    assert_ok!(output.check());
}

// ── Validation and edge cases ────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_quality_rejected_before_any_work() {
    let fx = Fixture::new();

    for quality in [0u8, 101] {
        let out = fx.out(&format!("q{quality}"));
        let config = ConversionConfig {
            output_dir: Some(out.clone()),
            quality,
            ..Default::default()
        };
        let renderer = Arc::new(FakeRenderer::new(3));

        let err = assert_err!(convert_with(&fx.pdf, &config, renderer.clone()).await);
        assert!(matches!(err, Pdf2ImgError::InvalidQuality(q) if q == quality));
        assert_eq!(renderer.opens.load(Ordering::SeqCst), 0);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
        assert!(!out.exists(), "no output directory for quality {quality}");
    }
}

#[tokio::test]
async fn test_empty_document_succeeds_without_archive() {
    let fx = Fixture::new();
    let out = fx.out("pages");
    let renderer = Arc::new(FakeRenderer::new(0));
    let output = convert_with(&fx.pdf, &config(&out, 4), renderer.clone())
        .await
        .unwrap();

    assert!(out.is_dir());
    assert!(dir_listing(&out).is_empty());
    assert!(output.files.is_empty());
    assert!(output.failures.is_empty());
    assert!(output.archive.is_none());
    assert!(!fx.archive().exists());
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    assert_ok!(output.check());
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let fx = Fixture::new();
    let err = assert_err!(
        convert_with(
            fx.dir().join("nope.pdf"),
            &config(&fx.out("pages"), 2),
            Arc::new(FakeRenderer::new(1)),
        )
        .await
    );
    assert!(matches!(err, Pdf2ImgError::FileNotFound { .. }));
}

#[tokio::test]
async fn test_non_pdf_input_is_fatal() {
    let fx = Fixture::new();
    let txt = fx.dir().join("notes.pdf");
    std::fs::write(&txt, b"hello world").unwrap();

    let err = assert_err!(convert_with(&txt, &config(&fx.out("pages"), 2), Arc::new(FakeRenderer::new(1))).await);
    assert!(matches!(err, Pdf2ImgError::NotAPdf { .. }));
}

#[tokio::test]
async fn test_default_output_dir_sits_beside_source() {
    let fx = Fixture::new();
    let output = convert_with(&fx.pdf, &ConversionConfig::default(), Arc::new(FakeRenderer::new(2)))
        .await
        .unwrap();

    assert_eq!(output.output_dir, fx.dir().join("report_images"));
    assert_eq!(dir_listing(&output.output_dir), vec!["page_001.jpg", "page_002.jpg"]);
}

#[tokio::test]
async fn test_config_warnings_are_returned() {
    let fx = Fixture::new();
    let config = ConversionConfig::builder()
        .output_dir(fx.out("pages"))
        .dpi(30)
        .build()
        .unwrap();
    let output = convert_with(&fx.pdf, &config, Arc::new(FakeRenderer::new(1)))
        .await
        .unwrap();

    assert_eq!(output.warnings, vec![ConfigWarning::LowDpi(30)]);
    assert_eq!(output.files.len(), 1);
}

// ── Progress, streaming, inspect ─────────────────────────────────────────────

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }

    fn on_page_complete(&self, page_num: usize, _total: usize, _bytes: usize) {
        self.events.lock().unwrap().push(format!("ok {page_num}"));
    }

    fn on_page_error(&self, page_num: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err {page_num}"));
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_pages}"));
    }

    fn on_archive_complete(&self, _archive_path: &Path, members: usize) {
        self.events.lock().unwrap().push(format!("archive {members}"));
    }
}

#[tokio::test]
async fn test_progress_events_cover_every_page() {
    let fx = Fixture::new();
    let cb = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .output_dir(fx.out("pages"))
        .workers(2)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    convert_with(&fx.pdf, &config, Arc::new(FakeRenderer::new(3).corrupt(&[2])))
        .await
        .unwrap();

    let events = cb.events.lock().unwrap().clone();
    assert_eq!(events.first().map(String::as_str), Some("start 3"));
    assert_eq!(&events[events.len() - 2..], ["done 2/3", "archive 2"]);

    let mut page_events: Vec<&str> = events[1..4].iter().map(String::as_str).collect();
    page_events.sort();
    assert_eq!(page_events, vec!["err 2", "ok 1", "ok 3"]);
}

#[tokio::test]
async fn test_stream_yields_pages_in_order() {
    let fx = Fixture::new();
    let stream = convert_stream_with(
        &fx.pdf,
        &config(&fx.out("unused"), 4),
        Arc::new(FakeRenderer::new(8).corrupt(&[5])),
    )
    .await
    .unwrap();

    let results: Vec<_> = stream.collect().await;
    let indices: Vec<usize> = results.iter().map(|r| r.page_index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    assert!(matches!(results[4].outcome, Err(PageError::RenderFailed { page: 5, .. })));
    assert!(results.iter().filter(|r| r.is_success()).count() == 7);
    // Streaming does not touch the filesystem.
    assert!(!fx.out("unused").exists());
}

#[tokio::test]
async fn test_stream_rejects_bad_config_before_rendering() {
    let fx = Fixture::new();
    let config = ConversionConfig {
        quality: 0,
        ..Default::default()
    };
    let renderer = Arc::new(FakeRenderer::new(3));

    let result = convert_stream_with(&fx.pdf, &config, renderer.clone()).await;
    assert!(matches!(result, Err(Pdf2ImgError::InvalidQuality(0))));
    assert_eq!(renderer.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inspect_reads_metadata_only() {
    let fx = Fixture::new();
    let renderer = Arc::new(FakeRenderer::new(12));
    let meta = inspect_with(&fx.pdf, None, renderer.clone()).await.unwrap();

    assert_eq!(meta.page_count, 12);
    assert_eq!(meta.pdf_version, "1.7");
    assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_output_is_json_serialisable() {
    let fx = Fixture::new();
    let output = convert_with(
        &fx.pdf,
        &config(&fx.out("pages"), 2),
        Arc::new(FakeRenderer::new(2).corrupt(&[1])),
    )
    .await
    .unwrap();

    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["stats"]["total_pages"], 2);
    assert_eq!(json["files"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["state"], serde_json::json!(output.state));
}

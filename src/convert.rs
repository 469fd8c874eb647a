//! Eager (full-document) conversion entry points.
//!
//! ## Why eager vs. streaming?
//!
//! This module provides the simpler API: render every page, buffer the
//! results, sort once, then write and archive. Pages are bounded and usually
//! few, so holding them all in memory is fine. Use
//! [`crate::stream::convert_stream`] instead when you want pages in order as
//! soon as they are ready, without buffering the whole document.

use crate::config::{ConfigWarning, ConversionConfig};
use crate::error::Pdf2ImgError;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, RunState};
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::sequence::{self, OrderedResults};
use crate::pipeline::tasks::{self, RenderParams, RenderTask};
use crate::pipeline::{archive, input, write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert every page of a PDF into an image file using pdfium.
///
/// # Returns
/// `Ok(ConversionOutput)` once every page was attempted, even if some pages
/// failed (see `output.failures`, or call [`ConversionOutput::check`]).
///
/// # Errors
/// Returns `Err(Pdf2ImgError)` only for fatal errors, all raised before any
/// page is dispatched:
/// - invalid configuration (quality outside 1–100, zero workers, …)
/// - file not found / permission denied / not a PDF
/// - document cannot be opened or its page count is unusable
/// - output directory cannot be created
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    convert_with(input, config, Arc::new(PdfiumRenderer::new())).await
}

/// [`convert`] with a caller-supplied renderer.
pub async fn convert_with(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
    renderer: Arc<dyn PageRenderer>,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let total_start = Instant::now();
    let mut run = RunTracker::default();

    // ── Steps 1–3: validate, load metadata, build tasks ──────────────────
    let prepared = prepare(input.as_ref(), config, &renderer, &mut run).await?;
    let PreparedRun {
        source,
        metadata,
        tasks,
        warnings,
    } = prepared;
    let total_pages = metadata.page_count;

    // ── Step 4: output directory ─────────────────────────────────────────
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| input::default_output_dir(&source));
    tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
        run.fail(Pdf2ImgError::OutputDirFailed {
            path: output_dir.clone(),
            source: e,
        })
    })?;

    let workers = config.resolved_workers();
    info!(
        "{} pages → {} ({} @ {} DPI, {} workers)",
        total_pages,
        output_dir.display(),
        config.format,
        config.dpi,
        workers
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 5: render on the worker pool ────────────────────────────────
    let render_start = Instant::now();
    let pool = WorkerPool::new(Arc::clone(&renderer), workers)
        .with_page_timeout(config.page_timeout_secs.map(Duration::from_secs));
    let results = pool.dispatch(tasks, config.progress_callback.clone());
    run.advance(RunState::Dispatched);

    run.advance(RunState::Collecting);
    let collected = sequence::collect_results(results).await;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!(
        "Rendered {} pages in {}ms",
        collected.len(),
        render_duration_ms
    );

    // ── Step 6: restore page order ───────────────────────────────────────
    let ordered = OrderedResults::sequence(collected, total_pages);
    run.advance(RunState::Sequenced);

    // ── Step 7: write page files ─────────────────────────────────────────
    let write_start = Instant::now();
    let dir = output_dir.clone();
    let report = tokio::task::spawn_blocking(move || write::write_pages(&dir, ordered))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Writer task panicked: {}", e)))?;
    let write_duration_ms = write_start.elapsed().as_millis() as u64;
    run.advance(RunState::Written);

    info!(
        "{}/{} pages written to {}",
        report.files.len(),
        total_pages,
        output_dir.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, report.files.len());
    }

    // ── Step 8: archive ──────────────────────────────────────────────────
    let mut archive_path = None;
    let mut archive_error = None;
    if config.create_archive && !report.files.is_empty() {
        let target = input::default_archive_path(&source);
        match archive::archive_pages(target, report.files.clone()).await {
            Ok(path) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_archive_complete(&path, report.files.len());
                }
                archive_path = Some(path);
                run.advance(RunState::Archived);
            }
            Err(e) => {
                warn!(
                    "{}; page files in {} are still valid",
                    e,
                    output_dir.display()
                );
                archive_error = Some(e.to_string());
                run.advance(RunState::ArchiveSkipped);
            }
        }
    } else {
        if config.create_archive {
            debug!("No page was written; skipping archive");
        }
        run.advance(RunState::ArchiveSkipped);
    }

    let archive_state = run.state();

    // ── Step 9: summary ──────────────────────────────────────────────────
    let stats = ConversionStats {
        total_pages,
        processed_pages: report.files.len(),
        failed_pages: report.failures.len(),
        workers,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        write_duration_ms,
    };

    if !report.failures.is_empty() {
        let pages: Vec<String> = report.failures.iter().map(|e| e.page().to_string()).collect();
        warn!(
            "{} pages failed: {}",
            report.failures.len(),
            pages.join(", ")
        );
    }
    info!(
        "Conversion complete: {}/{} pages, {}ms total",
        stats.processed_pages, total_pages, stats.total_duration_ms
    );
    run.advance(RunState::Done);

    Ok(ConversionOutput {
        source,
        output_dir,
        files: report.files,
        failures: report.failures,
        archive: archive_path,
        archive_error,
        warnings,
        metadata,
        stats,
        archive_state,
        state: run.state(),
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Extract PDF metadata without rendering any page.
pub async fn inspect(input: impl AsRef<Path>) -> Result<DocumentMetadata, Pdf2ImgError> {
    inspect_with(input, None, Arc::new(PdfiumRenderer::new())).await
}

/// [`inspect`] with a password and a caller-supplied renderer.
pub async fn inspect_with(
    input: impl AsRef<Path>,
    password: Option<&str>,
    renderer: Arc<dyn PageRenderer>,
) -> Result<DocumentMetadata, Pdf2ImgError> {
    let source = input::resolve_local(input)?;
    load_metadata(&renderer, &source, password.map(str::to_string)).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Tracks the run through [`RunState`], rejecting illegal transitions.
#[derive(Debug)]
pub(crate) struct RunTracker {
    state: RunState,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self {
            state: RunState::Init,
        }
    }
}

impl RunTracker {
    pub(crate) fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal run transition {:?} → {:?}",
            self.state,
            next
        );
        debug!("Run state: {:?} → {:?}", self.state, next);
        self.state = next;
    }

    /// Move to `Failed` and hand the error back for propagation.
    pub(crate) fn fail(&mut self, err: Pdf2ImgError) -> Pdf2ImgError {
        self.advance(RunState::Failed);
        err
    }

    pub(crate) fn state(&self) -> RunState {
        self.state
    }
}

/// Everything known before the first page is dispatched.
pub(crate) struct PreparedRun {
    pub(crate) source: PathBuf,
    pub(crate) metadata: DocumentMetadata,
    pub(crate) tasks: Vec<RenderTask>,
    pub(crate) warnings: Vec<ConfigWarning>,
}

/// Validate config and input, open the document once, generate tasks.
/// Leaves `run` in `MetadataLoaded` or `Failed`.
pub(crate) async fn prepare(
    input: &Path,
    config: &ConversionConfig,
    renderer: &Arc<dyn PageRenderer>,
    run: &mut RunTracker,
) -> Result<PreparedRun, Pdf2ImgError> {
    config.validate().map_err(|e| run.fail(e))?;
    let source = input::resolve_local(input).map_err(|e| run.fail(e))?;
    info!("Starting conversion: {}", source.display());

    let warnings = config.warnings();
    for w in &warnings {
        warn!("{}", w);
    }

    let metadata = load_metadata(renderer, &source, config.password.clone())
        .await
        .map_err(|e| run.fail(e))?;
    run.advance(RunState::MetadataLoaded);
    info!("PDF has {} pages", metadata.page_count);

    let tasks = tasks::generate_tasks(&source, metadata.page_count, RenderParams::from_config(config))
        .map_err(|e| run.fail(e))?;

    Ok(PreparedRun {
        source,
        metadata,
        tasks,
        warnings,
    })
}

async fn load_metadata(
    renderer: &Arc<dyn PageRenderer>,
    source: &Path,
    password: Option<String>,
) -> Result<DocumentMetadata, Pdf2ImgError> {
    let renderer = Arc::clone(renderer);
    let path = source.to_path_buf();

    tokio::task::spawn_blocking(move || {
        renderer
            .open_metadata(&path, password.as_deref())
            .map_err(|e| e.into_fatal(&path))
    })
    .await
    .map_err(|e| Pdf2ImgError::Internal(format!("Metadata task panicked: {}", e)))?
}

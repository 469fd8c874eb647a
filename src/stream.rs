//! Streaming conversion API: emit pages in order as soon as they are ready.
//!
//! ## Why stream?
//!
//! Large documents take a while to rasterise. A stream lets callers show
//! partial results, drive their own writer, or stop early (dropping the
//! stream stops dispatching further pages) without holding every rendered
//! page in memory.
//!
//! Unlike the eager [`crate::convert::convert`], nothing is written to disk
//! here. Workers still finish in any order; a [`ReorderBuffer`] holds only
//! the pages that arrived early and releases each contiguous run as soon as
//! the next expected page completes, so items always come out in ascending
//! page order.

use crate::config::ConversionConfig;
use crate::convert::{prepare, RunTracker};
use crate::error::Pdf2ImgError;
use crate::output::RenderResult;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::render::{PageRenderer, PdfiumRenderer};
use crate::pipeline::sequence::ReorderBuffer;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results in ascending page order.
pub type PageStream = Pin<Box<dyn Stream<Item = RenderResult> + Send>>;

/// Render a PDF, streaming pages in page order.
///
/// # Returns
/// - `Ok(PageStream)` with exactly one item per page, failures included
/// - `Err(Pdf2ImgError)` for fatal errors (bad config, missing file, corrupt
///   document), before any page is dispatched
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let mut pages = convert_stream("document.pdf", &config).await?;
/// while let Some(result) = pages.next().await {
///     match result.outcome {
///         Ok(page) => println!("page {}: {} bytes", result.page_index + 1, page.bytes.len()),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2ImgError> {
    convert_stream_with(input, config, Arc::new(PdfiumRenderer::new())).await
}

/// [`convert_stream`] with a caller-supplied renderer.
pub async fn convert_stream_with(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
    renderer: Arc<dyn PageRenderer>,
) -> Result<PageStream, Pdf2ImgError> {
    // Only the pre-dispatch states are tracked here; after `MetadataLoaded`
    // the caller drives the run by polling the stream.
    let mut run = RunTracker::default();
    let prepared = prepare(input.as_ref(), config, &renderer, &mut run).await?;
    let total_pages = prepared.metadata.page_count;
    let workers = config.resolved_workers();

    info!(
        "Streaming {} pages ({} @ {} DPI, {} workers)",
        total_pages, config.format, config.dpi, workers
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    let pool = WorkerPool::new(renderer, workers)
        .with_page_timeout(config.page_timeout_secs.map(Duration::from_secs));
    let unordered = pool.dispatch(prepared.tasks, config.progress_callback.clone());

    Ok(Box::pin(in_page_order(unordered, total_pages)))
}

/// Reorder a completion-order result stream into ascending page order.
///
/// Pages below `expected_pages` that never show up are emitted as
/// [`crate::PageError::Lost`] once the input ends.
pub fn in_page_order<S>(results: S, expected_pages: usize) -> impl Stream<Item = RenderResult> + Send
where
    S: Stream<Item = RenderResult> + Unpin + Send,
{
    struct State<S> {
        inner: S,
        buffer: ReorderBuffer,
        ready: VecDeque<RenderResult>,
        exhausted: bool,
    }

    let state = State {
        inner: results,
        buffer: ReorderBuffer::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(next) = st.ready.pop_front() {
                return Some((next, st));
            }
            if st.exhausted {
                return None;
            }
            match st.inner.next().await {
                Some(result) => st.ready.extend(st.buffer.push(result)),
                None => {
                    st.exhausted = true;
                    st.ready.extend(st.buffer.finish(expected_pages));
                }
            }
        }
    })
}

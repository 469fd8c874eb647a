//! Worker pool: fan render tasks out to at most `W` concurrent workers.
//!
//! ## Why spawn_blocking + buffer_unordered?
//!
//! Rendering is CPU-bound and calls into a C++ library, so each task runs on
//! tokio's blocking thread pool. `buffer_unordered(W)` keeps exactly `W`
//! tasks in flight and hands results back as soon as they finish, in
//! whatever order the scheduler produces. Ordering is restored later by the
//! sequencer and nowhere else.
//!
//! ## Failure boundary
//!
//! Each task is wrapped so that any fault becomes a tagged
//! [`PageError`] instead of propagating:
//!
//! | Fault | Result |
//! |-------|--------|
//! | renderer returns `Err` | [`PageError::RenderFailed`] |
//! | renderer panics | [`PageError::Panicked`] (caught by the `JoinHandle`) |
//! | task exceeds `page_timeout` | [`PageError::Timeout`] |
//! | run cancelled before start | [`PageError::Cancelled`] |
//!
//! A timed-out render keeps running on its blocking thread until the
//! renderer returns; its document handle is dropped there, not leaked.
//! Each render holds one of `W` semaphore permits until it actually returns,
//! so a timeout never lets more than `W` renders run at once.

use crate::error::PageError;
use crate::output::RenderResult;
use crate::pipeline::render::PageRenderer;
use crate::pipeline::tasks::RenderTask;
use crate::progress::ProgressCallback;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::debug;

/// Results in completion order.
pub type ResultStream = BoxStream<'static, RenderResult>;

/// Stops a pool from starting further tasks.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Tasks that have not started yet resolve to [`PageError::Cancelled`].
    /// Tasks already rendering run to completion.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fixed-size pool executing [`RenderTask`]s against a [`PageRenderer`].
pub struct WorkerPool {
    renderer: Arc<dyn PageRenderer>,
    workers: usize,
    page_timeout: Option<Duration>,
    cancel: CancelHandle,
}

impl WorkerPool {
    /// `workers` is clamped to at least 1.
    pub fn new(renderer: Arc<dyn PageRenderer>, workers: usize) -> Self {
        Self {
            renderer,
            workers: workers.max(1),
            page_timeout: None,
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_page_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.page_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run every task, yielding exactly one [`RenderResult`] per task in
    /// completion order. Emits one progress event per finished task.
    ///
    /// Dropping the stream stops dispatch of tasks that have not started.
    pub fn dispatch(
        &self,
        tasks: Vec<RenderTask>,
        progress: Option<ProgressCallback>,
    ) -> ResultStream {
        let total = tasks.len();
        let renderer = Arc::clone(&self.renderer);
        let timeout = self.page_timeout;
        let cancel = self.cancel.clone();
        let slots = Arc::new(Semaphore::new(self.workers));

        debug!("Dispatching {} tasks to {} workers", total, self.workers);

        stream::iter(tasks.into_iter().map(move |task| {
            let renderer = Arc::clone(&renderer);
            let cancel = cancel.clone();
            let slots = Arc::clone(&slots);
            let progress = progress.clone();
            async move {
                let result = run_task(renderer, task, timeout, &cancel, slots).await;
                if let Some(cb) = progress {
                    match &result.outcome {
                        Ok(page) => cb.on_page_complete(result.page_num(), total, page.bytes.len()),
                        Err(e) => cb.on_page_error(result.page_num(), total, &e.to_string()),
                    }
                }
                result
            }
        }))
        .buffer_unordered(self.workers)
        .boxed()
    }
}

async fn run_task(
    renderer: Arc<dyn PageRenderer>,
    task: RenderTask,
    timeout: Option<Duration>,
    cancel: &CancelHandle,
    slots: Arc<Semaphore>,
) -> RenderResult {
    let page_index = task.page_index;
    let page = task.page_num();
    let cancelled = RenderResult {
        page_index,
        outcome: Err(PageError::Cancelled { page }),
    };

    if cancel.is_cancelled() {
        return cancelled;
    }
    // Waits for a timed-out render to actually finish before starting another.
    let permit = match slots.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return cancelled,
    };
    if cancel.is_cancelled() {
        return cancelled;
    }

    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        renderer.render_page(&task)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                return RenderResult {
                    page_index,
                    outcome: Err(PageError::Timeout {
                        page,
                        limit_ms: limit.as_millis() as u64,
                    }),
                }
            }
        },
        None => handle.await,
    };

    let outcome = match joined {
        Ok(Ok(rendered)) => Ok(rendered),
        Ok(Err(e)) => Err(PageError::RenderFailed {
            page,
            detail: e.to_string(),
        }),
        Err(e) => Err(PageError::Panicked {
            page,
            detail: join_error_detail(e),
        }),
    };

    RenderResult {
        page_index,
        outcome,
    }
}

fn join_error_detail(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Bounded fan-out/fan-in over one deduplicated URL batch.
//!
//! One producer hands URLs to a fixed pool of workers over a capacity-1
//! queue; workers publish results to a single collector. Every task shares
//! one [`CancelScope`]: the parent token, the batch deadline, the first
//! failing worker, and the collector on completion all raise it, and the
//! first cause to be recorded decides the reported outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::FutureExt;
use mux_core::{FetchJob, FetchResult, RequestId};
use mux_logging::{mux_debug, mux_info, mux_trace, mux_warn};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{CancelReason, FailureKind, FetchError, Fetcher, PipelineError};

#[derive(Debug)]
enum StopCause {
    Completed,
    Deadline,
    Failed(FetchError),
}

/// Cancellation scope of one pipeline run. Once raised it stays raised.
#[derive(Clone)]
struct CancelScope {
    token: CancellationToken,
    cause: Arc<OnceLock<StopCause>>,
}

impl CancelScope {
    fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// Records `cause` unless the scope was already raised, then broadcasts.
    fn raise(&self, cause: StopCause) {
        if !self.token.is_cancelled() {
            let _ = self.cause.set(cause);
        }
        self.token.cancel();
    }

    /// Records `cause` if none was recorded yet, even after the broadcast.
    fn record(&self, cause: StopCause) {
        let _ = self.cause.set(cause);
    }

    async fn raised(&self) {
        self.token.cancelled().await
    }

    fn cause(&self) -> Option<&StopCause> {
        self.cause.get()
    }
}

/// Shared consumer end of the URL queue.
#[derive(Clone)]
struct UrlQueue {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl UrlQueue {
    async fn next(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Runs [`FetchJob`]s against a [`Fetcher`].
#[derive(Clone)]
pub struct FetchPipeline {
    fetcher: Arc<dyn Fetcher>,
}

impl FetchPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetches every URL of `job`, or none.
    ///
    /// Cancelling `parent` ends the run with [`CancelReason::Parent`]. The
    /// returned results are unordered.
    pub async fn run(
        &self,
        job: FetchJob,
        parent: &CancellationToken,
    ) -> Result<Vec<FetchResult>, PipelineError> {
        let rid = job.rid();
        let total = job.urls().len();
        mux_info!(
            "[{}] Fetch started: {} urls, {} workers",
            rid,
            total,
            job.workers()
        );

        let scope = CancelScope::child_of(parent);
        let mut tasks = JoinSet::new();

        if let Some(limit) = job.batch_timeout() {
            let scope = scope.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = scope.raised() => {}
                    _ = tokio::time::sleep(limit) => scope.raise(StopCause::Deadline),
                }
            });
        }

        let (url_tx, url_rx) = mpsc::channel::<String>(1);
        let queue = UrlQueue {
            rx: Arc::new(Mutex::new(url_rx)),
        };
        tasks.spawn(produce(job.urls().to_vec(), url_tx, scope.clone()));

        let (result_tx, mut result_rx) = mpsc::channel::<FetchResult>(1);
        for _ in 0..job.workers() {
            tasks.spawn(run_worker(
                self.fetcher.clone(),
                rid,
                queue.clone(),
                result_tx.clone(),
                scope.clone(),
                job.item_timeout(),
            ));
        }
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            tokio::select! {
                biased;
                _ = scope.raised() => break,
                received = result_rx.recv() => match received {
                    Some(result) => results.push(result),
                    None => break,
                },
            }
        }
        let complete = results.len() == total;
        if complete {
            scope.raise(StopCause::Completed);
        } else {
            scope.token.cancel();
        }

        // Fetch panics are caught inside the workers; this covers the rest.
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    scope.record(StopCause::Failed(FetchError::new(
                        "",
                        FailureKind::WorkerPanicked,
                        err.to_string(),
                    )));
                }
            }
        }

        if complete {
            mux_info!("[{}] Fetch finished successfully", rid);
            return Ok(results);
        }
        let outcome = match scope.cause() {
            Some(StopCause::Failed(err)) => PipelineError::Fetch(err.clone()),
            Some(StopCause::Deadline) => PipelineError::Canceled(CancelReason::BatchDeadline),
            Some(StopCause::Completed) | None => PipelineError::Canceled(CancelReason::Parent),
        };
        if outcome.is_canceled() {
            mux_info!("[{}] Fetch was canceled: {}", rid, outcome);
        } else {
            mux_warn!("[{}] Fetch finished with error: {}", rid, outcome);
        }
        Err(outcome)
    }
}

async fn produce(urls: Vec<String>, url_tx: mpsc::Sender<String>, scope: CancelScope) {
    for url in urls {
        tokio::select! {
            biased;
            _ = scope.raised() => return,
            sent = url_tx.send(url) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

async fn run_worker(
    fetcher: Arc<dyn Fetcher>,
    rid: RequestId,
    queue: UrlQueue,
    results: mpsc::Sender<FetchResult>,
    scope: CancelScope,
    item_timeout: Option<Duration>,
) {
    loop {
        let url = tokio::select! {
            biased;
            _ = scope.raised() => return,
            next = queue.next() => match next {
                Some(url) => url,
                None => return,
            },
        };

        let fetched = tokio::select! {
            biased;
            _ = scope.raised() => {
                mux_trace!("[{}] dropping in-flight fetch of {}", rid, url);
                return;
            }
            caught = AssertUnwindSafe(fetcher.fetch(rid, &url, item_timeout)).catch_unwind() => {
                match caught {
                    Ok(fetched) => fetched,
                    Err(payload) => Err(FetchError::new(
                        url.as_str(),
                        FailureKind::WorkerPanicked,
                        panic_message(payload.as_ref()),
                    )),
                }
            }
        };

        match fetched {
            Ok(result) => {
                tokio::select! {
                    biased;
                    _ = scope.raised() => return,
                    sent = results.send(result) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                mux_debug!("[{}] worker stopping: {}", rid, err);
                scope.raise(StopCause::Failed(err));
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

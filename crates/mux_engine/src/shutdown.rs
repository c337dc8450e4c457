//! Process-wide drain-then-stop coordination.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use mux_core::{ShutdownEvent, ShutdownState};
use mux_logging::{mux_info, mux_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All tracked work finished inside the grace period.
    Drained,
    /// The grace period elapsed; `abandoned` tasks were force-terminated.
    DeadlineElapsed { abandoned: usize },
}

struct Inner {
    grace: Duration,
    state: watch::Sender<ShutdownState>,
    outcome: OnceLock<DrainOutcome>,
    draining: CancellationToken,
    force: CancellationToken,
    tracker: TaskTracker,
}

/// Owns the `Running -> Draining -> Stopped` lifecycle and the set of
/// in-flight dispatches.
///
/// `draining` fires on the first transition and tells acceptors and
/// connections to stop taking new work. `force` fires only if the grace
/// period runs out; every tracked task must end promptly once it does.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            inner: Arc::new(Inner {
                grace,
                state,
                outcome: OnceLock::new(),
                draining: CancellationToken::new(),
                force: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn grace(&self) -> Duration {
        self.inner.grace
    }

    /// Cancelled once draining begins.
    pub fn draining_signal(&self) -> CancellationToken {
        self.inner.draining.clone()
    }

    /// Cancelled when the grace period is exceeded. Use as the parent of
    /// any work that must not outlive the drain.
    pub fn force_signal(&self) -> CancellationToken {
        self.inner.force.clone()
    }

    /// Spawns `task` as in-flight work the drain waits for.
    pub fn spawn_tracked<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.tracker.spawn(task)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Drains and stops. Concurrent and repeated calls share one drain and
    /// all return its outcome.
    ///
    /// The drain runs on its own task, so dropping the returned future does
    /// not stall it.
    pub async fn shutdown(&self) -> DrainOutcome {
        let leader = self.inner.state.send_if_modified(|state| {
            match state.on(ShutdownEvent::TerminationRequested) {
                Ok(next) => {
                    *state = next;
                    true
                }
                Err(_) => false,
            }
        });

        if leader {
            let coordinator = self.clone();
            tokio::spawn(async move { coordinator.drain().await });
        }
        self.stopped().await
    }

    /// Resolves once the coordinator reaches `Stopped`.
    pub async fn stopped(&self) -> DrainOutcome {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state == ShutdownState::Stopped).await;
        self.inner
            .outcome
            .get()
            .copied()
            .unwrap_or(DrainOutcome::Drained)
    }

    async fn drain(&self) -> DrainOutcome {
        let inner = &self.inner;
        mux_info!(
            "Shutdown requested, draining {} in-flight tasks (grace {:?})",
            inner.tracker.len(),
            inner.grace
        );
        inner.draining.cancel();
        inner.tracker.close();

        let (outcome, event) = match tokio::time::timeout(inner.grace, inner.tracker.wait()).await
        {
            Ok(()) => {
                mux_info!("All in-flight work drained");
                (DrainOutcome::Drained, ShutdownEvent::Drained)
            }
            Err(_) => {
                let abandoned = inner.tracker.len();
                mux_warn!(
                    "Grace period of {:?} exceeded, force-terminating {} tasks",
                    inner.grace,
                    abandoned
                );
                inner.force.cancel();
                (
                    DrainOutcome::DeadlineElapsed { abandoned },
                    ShutdownEvent::DeadlineElapsed,
                )
            }
        };

        let _ = inner.outcome.set(outcome);
        inner.state.send_modify(|state| {
            if let Ok(next) = state.on(event) {
                *state = next;
            }
        });
        mux_info!("Shutdown complete: {:?}", outcome);
        outcome
    }
}

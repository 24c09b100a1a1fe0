use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use super::errors::FetchError;
use crate::config::PollingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// When false the first probe waits one full interval
    pub probe_immediately: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            probe_immediately: true,
        }
    }
}

impl From<&PollingConfig> for PollerConfig {
    fn from(polling: &PollingConfig) -> Self {
        Self {
            interval: polling.interval(),
            probe_immediately: polling.probe_immediately,
        }
    }
}

/// Attempt counter for logging; pins at the maximum instead of wrapping
fn next_attempt(attempt: u32) -> u32 {
    attempt.saturating_add(1)
}

#[derive(Debug)]
struct HandleState {
    dead: AtomicBool,
    live: Arc<AtomicUsize>,
}

impl HandleState {
    /// Returns true only for the caller that actually stopped the poll
    fn kill(&self) -> bool {
        let stopped = self
            .dead
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if stopped {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
        stopped
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }
}

/// One active polling loop. Dead once it has reported, failed, or been cancelled.
///
/// Dropping the handle cancels the poll.
#[derive(Debug)]
pub struct PollHandle {
    id: Uuid,
    state: Arc<HandleState>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        !self.state.is_dead()
    }

    /// Stop the poll. No probe is issued and no callback fires after this returns.
    /// Cancelling a stopped handle is a no-op.
    pub fn cancel(&self) {
        if self.state.kill() {
            debug!(poll.id = %self.id, "Poll cancelled");
        }
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Repeatedly runs a readiness probe until it reports ready or fails.
///
/// Loops run on the Tokio runtime the poller was created in.
///
/// `Ok(false)` means "not ready yet" and schedules another probe; `Err` means readiness
/// cannot be determined, so the poll stops and reports instead of retrying.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    config: PollerConfig,
    live: Arc<AtomicUsize>,
    runtime: Handle,
}

impl StatusPoller {
    pub fn new(config: PollerConfig) -> Self {
        Self {
            config,
            live: Arc::new(AtomicUsize::new(0)),
            runtime: Handle::current(),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Number of handles started by this poller that are still alive
    pub fn live_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn start<P, Fut, R, E>(&self, mut probe: P, on_ready: R, on_error: E) -> PollHandle
    where
        P: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool, FetchError>> + Send + 'static,
        R: FnOnce() + Send + 'static,
        E: FnOnce(FetchError) + Send + 'static,
    {
        let id = Uuid::new_v4();
        let state = Arc::new(HandleState {
            dead: AtomicBool::new(false),
            live: Arc::clone(&self.live),
        });
        self.live.fetch_add(1, Ordering::SeqCst);

        let PollerConfig {
            interval,
            probe_immediately,
        } = self.config;
        let task_state = Arc::clone(&state);

        let task = self.runtime.spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                if attempt > 0 || !probe_immediately {
                    tokio::time::sleep(interval).await;
                }
                attempt = next_attempt(attempt);

                if task_state.is_dead() {
                    return;
                }

                let outcome = probe().await;

                if task_state.is_dead() {
                    debug!(poll.id = %id, "Discarding probe result for a stopped poll");
                    return;
                }

                match outcome {
                    Ok(true) => {
                        debug!(poll.id = %id, attempt, "Probe reported ready");
                        if task_state.kill() {
                            on_ready();
                        }
                        return;
                    }
                    Ok(false) => {
                        debug!(poll.id = %id, attempt, "Probe reported not ready");
                    }
                    Err(err) => {
                        debug!(poll.id = %id, attempt, error = %err, "Probe failed, stopping poll");
                        if task_state.kill() {
                            on_error(err);
                        }
                        return;
                    }
                }
            }
        });

        PollHandle { id, state, task }
    }

    /// Same as [`PollHandle::cancel`]
    pub fn cancel(&self, handle: &PollHandle) {
        handle.cancel();
    }
}

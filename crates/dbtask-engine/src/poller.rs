/*
[INPUT]:  Readiness predicate, one-shot action, interval, optional deadline, CancellationToken
[OUTPUT]: Background check loop that runs the action once the predicate holds
[POS]:    Scheduling layer - deferred execution until a dependent resource is ready
[UPDATE]: When retry timing, cancellation or outcome reporting changes
*/

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Delay between two readiness checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a scheduled poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The action ran after `reschedules` failed checks
    Ran { reschedules: u32 },
    /// The handle or the parent token was cancelled first
    Cancelled,
    /// The deadline passed before the predicate held
    Expired { reschedules: u32 },
}

/// Checks `ready()` until it holds, then runs the action exactly once.
///
/// Checks are serialized on one spawned task, so at most one check is
/// outstanding. Without a deadline the poller keeps checking until the
/// token is cancelled.
#[derive(Debug, Clone)]
pub struct ReadinessPoller {
    interval: Duration,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl Default for ReadinessPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ReadinessPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up once `deadline` has elapsed since scheduling
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Tie the poll to a parent token, e.g. the owning session's shutdown token
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the check loop and return immediately
    pub fn schedule<R, A>(self, mut ready: R, action: A) -> PollHandle
    where
        R: FnMut() -> bool + Send + 'static,
        A: FnOnce() + Send + 'static,
    {
        let ReadinessPoller {
            interval,
            deadline,
            cancel,
        } = self;
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            let expires_at = deadline.map(|d| Instant::now() + d);
            let mut reschedules = 0u32;
            loop {
                if cancel.is_cancelled() {
                    debug!(reschedules, "readiness poll cancelled");
                    return PollOutcome::Cancelled;
                }
                if ready() {
                    debug!(reschedules, "resource ready, running deferred action");
                    action();
                    return PollOutcome::Ran { reschedules };
                }
                if expires_at.is_some_and(|at| Instant::now() + interval > at) {
                    warn!(reschedules, "readiness deadline expired");
                    return PollOutcome::Expired { reschedules };
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(reschedules, "readiness poll cancelled");
                        return PollOutcome::Cancelled;
                    }
                    _ = tokio::time::sleep(interval) => {
                        reschedules += 1;
                    }
                }
            }
        });

        PollHandle { join, cancel: token }
    }
}

/// Handle of a scheduled poll
#[derive(Debug)]
pub struct PollHandle {
    join: JoinHandle<PollOutcome>,
    cancel: CancellationToken,
}

impl PollHandle {
    /// Stop polling; the action will not run if it has not run yet
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the poll to end. A panicking predicate or action counts as cancelled.
    pub async fn outcome(self) -> PollOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "readiness poll task failed");
                PollOutcome::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = ReadinessPoller::default().schedule(|| true, move || flag.store(true, Ordering::SeqCst));
        assert_eq!(handle.outcome().await, PollOutcome::Ran { reschedules: 0 });
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let handle = ReadinessPoller::default()
            .with_deadline(Some(Duration::from_millis(350)))
            .schedule(|| false, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(handle.outcome().await, PollOutcome::Expired { reschedules: 3 });
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_token_cancels() {
        let parent = CancellationToken::new();
        let handle = ReadinessPoller::default()
            .with_cancellation(&parent)
            .schedule(|| false, || {});
        tokio::time::sleep(Duration::from_millis(250)).await;
        parent.cancel();
        assert_eq!(handle.outcome().await, PollOutcome::Cancelled);
    }
}

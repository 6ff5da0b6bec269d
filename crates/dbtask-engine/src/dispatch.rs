/*
[INPUT]:  Task records to run now, execution-context readiness predicates
[OUTPUT]: DispatchRequest queue fed once each task's context is ready
[POS]:    Staging layer - hands ready tasks to the (external) executor
[UPDATE]: When dispatch payloads or staging rules change
*/

use std::time::Duration;

use dbtask_model::{TaskProperties, TaskRecord};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::poller::{PollHandle, ReadinessPoller};

/// A task staged for execution
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub task_id: String,
    pub task_name: String,
    pub task_type: String,
    pub max_execution_time: Duration,
    pub properties: TaskProperties,
}

impl From<&TaskRecord> for DispatchRequest {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id().to_string(),
            task_name: record.name().to_string(),
            task_type: record.task_type().to_string(),
            max_execution_time: record.max_execution_time(),
            properties: record.properties().clone(),
        }
    }
}

/// Stages tasks for execution once their execution context is ready
#[derive(Debug)]
pub struct TaskDispatcher {
    queue: mpsc::UnboundedSender<DispatchRequest>,
    interval: Duration,
    deadline: Option<Duration>,
    shutdown: CancellationToken,
}

impl TaskDispatcher {
    pub fn new(interval: Duration, deadline: Option<Duration>) -> (Self, mpsc::UnboundedReceiver<DispatchRequest>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            queue,
            interval,
            deadline,
            shutdown: CancellationToken::new(),
        };
        (dispatcher, rx)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stage `task` as soon as `ready()` holds. Returns without waiting.
    pub fn run_when_ready<R>(&self, task: &TaskRecord, ready: R) -> PollHandle
    where
        R: FnMut() -> bool + Send + 'static,
    {
        let request = DispatchRequest::from(task);
        let queue = self.queue.clone();
        info!(task_id = %request.task_id, task_name = %request.task_name, "waiting for execution context");

        ReadinessPoller::new(self.interval)
            .with_deadline(self.deadline)
            .with_cancellation(&self.shutdown)
            .schedule(ready, move || {
                let task_id = request.task_id.clone();
                match queue.send(request) {
                    Ok(()) => info!(task_id = %task_id, "task dispatched"),
                    Err(_) => warn!(task_id = %task_id, "dispatch queue closed, task dropped"),
                }
            })
    }

    /// Cancel every pending readiness poll
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::PollOutcome;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_after_context_ready() {
        let (dispatcher, mut rx) = TaskDispatcher::new(Duration::from_millis(100), None);
        let mut record = TaskRecord::new("Backup", "pgBackup");
        record.assign_id("t1");

        let context_ready = Arc::new(AtomicBool::new(false));
        let seen = context_ready.clone();
        let handle = dispatcher.run_when_ready(&record, move || seen.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(rx.try_recv().is_err());
        context_ready.store(true, Ordering::SeqCst);

        assert!(matches!(handle.outcome().await, PollOutcome::Ran { .. }));
        let request = rx.recv().await.unwrap();
        assert_eq!(request.task_id, "t1");
        assert_eq!(request.task_type, "pgBackup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let (dispatcher, mut rx) = TaskDispatcher::new(Duration::from_millis(100), None);
        let record = TaskRecord::new("Backup", "pgBackup");
        let handle = dispatcher.run_when_ready(&record, || false);
        dispatcher.shutdown();
        assert_eq!(handle.outcome().await, PollOutcome::Cancelled);
        assert!(rx.try_recv().is_err());
    }
}

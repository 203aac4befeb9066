//! Concurrency slot tracking.

use std::sync::Arc;
use std::time::Duration;

use super::priority::Priority;
use super::queue::SchedulerInner;
use super::queued_task::TaskState;

/// RAII guard for one occupied concurrency slot.
///
/// Dropping the guard frees the slot, records the outcome and re-triggers
/// draining, whether the work settled normally, panicked or was torn down
/// with the runtime.
pub(crate) struct SlotGuard {
    inner: Arc<SchedulerInner>,
    task_id: u64,
    priority: Priority,
    waited: Duration,
    state: TaskState,
}

impl SlotGuard {
    pub(crate) fn new(inner: Arc<SchedulerInner>, task_id: u64, priority: Priority, waited: Duration) -> Self {
        Self {
            inner,
            task_id,
            priority,
            waited,
            state: TaskState::Running,
        }
    }

    pub(crate) fn settle(&mut self, state: TaskState) {
        self.state = state;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // Still Running here means the task future was dropped mid-run.
        let state = match self.state {
            TaskState::Running => TaskState::Failed,
            settled => settled,
        };
        self.inner.release(self.task_id, self.priority, state, self.waited);
    }
}

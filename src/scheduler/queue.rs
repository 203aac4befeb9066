//! Priority admission scheduler.
//!
//! Bounds concurrent execution, queues excess work by priority and sheds
//! sub-HIGH work once the queue is full. The queue, running count, config and
//! statistics share one lock; nothing awaits while holding it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::error::{Abort, SubmitError};
use super::priority::{Priority, PriorityQueue};
use super::queued_task::{Job, QueuedTask, TaskState, WorkJob};
use super::slot::SlotGuard;
use super::stats::{SchedulerStats, StatsCollector};
use crate::telemetry::metrics;

/// Configuration for the admission scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum tasks running at once. Clamped to at least 1.
    pub max_concurrent: usize,
    /// Queue length at which sub-HIGH submissions are rejected.
    pub max_queue_size: usize,
    /// Queue-wait deadline used when a submission does not name one.
    pub default_timeout: Duration,
    /// Optional bound on execution time. `None` lets started work run to completion.
    pub execution_timeout: Option<Duration>,
    /// Reserved fairness tunable; stored and reported, not applied.
    pub low_priority_delay: Duration,
    /// Reserved fairness tunable; stored and reported, not applied.
    pub high_priority_boost: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_queue_size: 100,
            default_timeout: Duration::from_secs(30),
            execution_timeout: None,
            low_priority_delay: Duration::from_millis(100),
            high_priority_boost: 2,
        }
    }
}

/// Partial config for hot reload. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfigUpdate {
    pub max_concurrent: Option<usize>,
    pub max_queue_size: Option<usize>,
    pub default_timeout: Option<Duration>,
    pub execution_timeout: Option<Option<Duration>>,
    pub low_priority_delay: Option<Duration>,
    pub high_priority_boost: Option<u32>,
}

impl SchedulerConfigUpdate {
    fn apply(self, config: &mut SchedulerConfig) {
        if let Some(v) = self.max_concurrent {
            config.max_concurrent = v.max(1);
        }
        if let Some(v) = self.max_queue_size {
            config.max_queue_size = v;
        }
        if let Some(v) = self.default_timeout {
            config.default_timeout = v;
        }
        if let Some(v) = self.execution_timeout {
            config.execution_timeout = v;
        }
        if let Some(v) = self.low_priority_delay {
            config.low_priority_delay = v;
        }
        if let Some(v) = self.high_priority_boost {
            config.high_priority_boost = v;
        }
    }
}

/// Read-only snapshot for polling by an external exporter.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub queue_length: usize,
    pub running: usize,
    pub config: SchedulerConfig,
    pub stats: SchedulerStats,
}

/// Synchronous admission refusal, before any task exists.
#[derive(Debug, Clone, Copy)]
struct Rejection {
    queue_length: usize,
    max: usize,
}

struct SchedulerState {
    config: SchedulerConfig,
    queue: PriorityQueue<QueuedTask>,
    running: usize,
    stats: StatsCollector,
}

impl SchedulerState {
    /// Pop runnable tasks while slots are free. Tasks whose deadline passed
    /// before their timer got to run are split out as expired.
    fn take_runnable(&mut self) -> (Vec<QueuedTask>, Vec<QueuedTask>) {
        let mut runnable = Vec::new();
        let mut expired = Vec::new();
        while self.running < self.config.max_concurrent {
            let Some(mut task) = self.queue.pop() else { break };
            task.cancel_timer();
            if task.is_expired() {
                task.state = TaskState::TimedOut;
                self.stats.record_timeout();
                expired.push(task);
                continue;
            }
            task.state = TaskState::Running;
            self.running += 1;
            runnable.push(task);
        }
        (runnable, expired)
    }
}

pub(crate) struct SchedulerInner {
    state: Mutex<SchedulerState>,
    next_id: AtomicU64,
}

impl SchedulerInner {
    fn admit(
        self: &Arc<Self>,
        job: Box<dyn Job>,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<u64, Rejection> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        metrics::record_submission(priority);

        let (runnable, expired, execution_timeout, queue_length) = {
            let mut state = self.state.lock();
            state.stats.record_submission(priority);

            let queue_length = state.queue.len();
            let max = state.config.max_queue_size;
            if !priority.is_urgent() && queue_length >= max {
                state.stats.record_rejection();
                drop(state);
                tracing::warn!(task_id = id, %priority, queue_length, max, "rejecting task: queue full");
                metrics::record_outcome(priority, "rejected");
                return Err(Rejection { queue_length, max });
            }

            let timeout = timeout.unwrap_or(state.config.default_timeout);
            state.queue.push(QueuedTask::new(id, priority, timeout, job), priority);
            let (runnable, expired) = state.take_runnable();

            // Only work that is still waiting needs a wait timer.
            if let Some(task) = state.queue.find_mut(|t| t.id == id) {
                let timer = spawn_wait_timer(Arc::downgrade(self), id, task.deadline);
                task.arm_timer(timer);
                tracing::debug!(task_id = id, %priority, queue_length = queue_length + 1, "task queued");
            }
            (runnable, expired, state.config.execution_timeout, state.queue.len())
        };

        metrics::record_queue_depth(queue_length);
        self.finish_expired(expired);
        self.launch(&Handle::current(), runnable, execution_timeout);
        Ok(id)
    }

    /// Start as much queued work as free slots allow.
    fn drain(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("no tokio runtime; drain deferred to next submission");
            return;
        };
        let (runnable, expired, execution_timeout, queue_length) = {
            let mut state = self.state.lock();
            let (runnable, expired) = state.take_runnable();
            (runnable, expired, state.config.execution_timeout, state.queue.len())
        };
        metrics::record_queue_depth(queue_length);
        self.finish_expired(expired);
        self.launch(&runtime, runnable, execution_timeout);
    }

    /// Spawn each task without waiting for it; its slot guard re-drains.
    fn launch(self: &Arc<Self>, runtime: &Handle, runnable: Vec<QueuedTask>, execution_timeout: Option<Duration>) {
        for task in runnable {
            let waited = task.waited();
            let (id, priority) = (task.id, task.priority);
            tracing::debug!(task_id = id, %priority, waited_ms = waited.as_millis() as u64, "task started");
            metrics::record_wait_time(priority, waited);

            let mut guard = SlotGuard::new(Arc::clone(self), id, priority, waited);
            let job = task.into_job();
            runtime.spawn(async move {
                let settled = job.run(execution_timeout).await;
                guard.settle(settled.state);
                drop(guard);
                settled.deliver();
            });
        }
        metrics::record_running(self.state.lock().running);
    }

    /// Called by the wait timer once the deadline passes.
    fn expire(&self, id: u64) {
        let task = {
            let mut state = self.state.lock();
            let task = state.queue.remove_where(|t| t.id == id);
            if task.is_some() {
                state.stats.record_timeout();
            }
            task
        };
        // Already popped by a drain pass: nothing to do.
        if let Some(mut task) = task {
            task.state = TaskState::TimedOut;
            self.finish_expired(vec![task]);
        }
    }

    fn finish_expired(&self, expired: Vec<QueuedTask>) {
        for task in expired {
            let waited = task.waited();
            tracing::warn!(
                task_id = task.id,
                priority = %task.priority,
                waited_ms = waited.as_millis() as u64,
                "task timed out in queue"
            );
            metrics::record_outcome(task.priority, "timeout");
            task.into_job().abort(Abort::Timeout { waited });
        }
    }

    /// Free a slot held by a settled task and pull in more work.
    pub(crate) fn release(self: &Arc<Self>, task_id: u64, priority: Priority, settled: TaskState, waited: Duration) {
        {
            let mut state = self.state.lock();
            state.running = state.running.saturating_sub(1);
            state.stats.record_settled(settled, waited);
        }
        let outcome = if settled == TaskState::Completed { "completed" } else { "failed" };
        tracing::debug!(task_id, %priority, outcome, "task settled");
        metrics::record_outcome(priority, outcome);
        self.drain();
    }
}

fn spawn_wait_timer(inner: Weak<SchedulerInner>, id: u64, deadline: Instant) -> AbortHandle {
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if let Some(inner) = inner.upgrade() {
            inner.expire(id);
        }
    })
    .abort_handle()
}

/// Priority admission scheduler. Cheap to clone; clones share one queue.
///
/// Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(mut config: SchedulerConfig) -> Self {
        config.max_concurrent = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    config,
                    queue: PriorityQueue::new(),
                    running: 0,
                    stats: StatsCollector::new(),
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Submit work and wait for its terminal outcome.
    ///
    /// `timeout` bounds time spent waiting in the queue; `None` uses the
    /// configured default. Sub-HIGH work is rejected with
    /// [`SubmitError::QueueFull`] when the queue is at capacity. Once started,
    /// work runs to completion unless an execution timeout is configured.
    pub async fn submit<F, Fut, T, E>(
        &self,
        work: F,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<T, SubmitError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = Box::new(WorkJob::new(work, tx));
        self.inner
            .admit(job, priority, timeout)
            .map_err(|r| SubmitError::QueueFull {
                priority,
                queue_length: r.queue_length,
                max: r.max,
            })?;
        rx.await.unwrap_or_else(|_| Err(SubmitError::Abandoned))
    }

    /// Snapshot of queue length, running count, config and stats.
    pub fn status(&self) -> SchedulerStatus {
        let state = self.inner.state.lock();
        SchedulerStatus {
            queue_length: state.queue.len(),
            running: state.running,
            config: state.config.clone(),
            stats: state.stats.snapshot(),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats.snapshot()
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.state.lock().config.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn running(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Hot-reload tunables. Lowering `max_concurrent` lets running work
    /// finish; raising it starts queued work immediately.
    pub fn update_config(&self, update: SchedulerConfigUpdate) -> SchedulerConfig {
        let config = {
            let mut state = self.inner.state.lock();
            update.apply(&mut state.config);
            state.config.clone()
        };
        tracing::info!(
            max_concurrent = config.max_concurrent,
            max_queue_size = config.max_queue_size,
            default_timeout_ms = config.default_timeout.as_millis() as u64,
            "scheduler config updated"
        );
        self.inner.drain();
        config
    }

    /// Fail every queued task with [`SubmitError::Cleared`]. Returns how many
    /// were cleared. Running work is unaffected.
    pub fn clear_queue(&self) -> usize {
        let cleared: Vec<QueuedTask> = {
            let mut state = self.inner.state.lock();
            let cleared: Vec<_> = state.queue.drain().collect();
            for _ in &cleared {
                state.stats.record_rejection();
            }
            cleared
        };
        let count = cleared.len();
        for mut task in cleared {
            task.cancel_timer();
            task.state = TaskState::Rejected;
            metrics::record_outcome(task.priority, "cleared");
            task.into_job().abort(Abort::Cleared);
        }
        if count > 0 {
            tracing::warn!(count, "cleared pending tasks");
        }
        metrics::record_queue_depth(0);
        count
    }

    pub fn reset_stats(&self) {
        self.inner.state.lock().stats = StatsCollector::new();
        tracing::info!("scheduler stats reset");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scheduler")
            .field("queue_length", &state.queue.len())
            .field("running", &state.running)
            .field("max_concurrent", &state.config.max_concurrent)
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

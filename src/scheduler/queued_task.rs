//! Queued task type for the admission scheduler.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::error::{Abort, SubmitError};
use super::priority::Priority;
use crate::clock::instant_after;

/// Response channel type for delivering outcomes back to callers.
pub(crate) type OutcomeTx<T, E> = oneshot::Sender<Result<T, SubmitError<E>>>;

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Rejected,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

/// A finished run whose outcome has not yet been handed to the caller.
///
/// Delivery is deferred so the scheduler can free the slot and record stats
/// before the caller observes the result.
pub(crate) struct Settled {
    pub(crate) state: TaskState,
    deliver: Box<dyn FnOnce() + Send>,
}

impl Settled {
    pub(crate) fn deliver(self) {
        (self.deliver)()
    }
}

/// Type-erased unit of work plus the channel its caller is waiting on.
pub(crate) trait Job: Send {
    /// Run to completion. Resolves once the work settles.
    fn run(self: Box<Self>, execution_timeout: Option<Duration>) -> BoxFuture<'static, Settled>;

    /// Deliver a terminal outcome for work that never ran.
    fn abort(self: Box<Self>, reason: Abort);
}

pub(crate) struct WorkJob<F, T, E> {
    work: F,
    tx: OutcomeTx<T, E>,
}

impl<F, T, E> WorkJob<F, T, E> {
    pub(crate) fn new(work: F, tx: OutcomeTx<T, E>) -> Self {
        Self { work, tx }
    }
}

impl<F, Fut, T, E> Job for WorkJob<F, T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    fn run(self: Box<Self>, execution_timeout: Option<Duration>) -> BoxFuture<'static, Settled> {
        let WorkJob { work, tx } = *self;
        async move {
            let guarded = AssertUnwindSafe(async move { work().await }).catch_unwind();
            let outcome = match execution_timeout {
                Some(limit) => match tokio::time::timeout(limit, guarded).await {
                    Ok(caught) => flatten(caught),
                    Err(_) => Err(SubmitError::ExecutionTimeout { limit }),
                },
                None => flatten(guarded.await),
            };
            let state = if outcome.is_ok() { TaskState::Completed } else { TaskState::Failed };
            Settled {
                state,
                // Caller may have gone away; the work still counts as processed.
                deliver: Box::new(move || {
                    let _ = tx.send(outcome);
                }),
            }
        }
        .boxed()
    }

    fn abort(self: Box<Self>, reason: Abort) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

fn flatten<T, E>(caught: Result<Result<T, E>, Box<dyn Any + Send>>) -> Result<T, SubmitError<E>> {
    match caught {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SubmitError::Work(e)),
        Err(panic) => Err(SubmitError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A submitted task waiting for (or holding) a concurrency slot.
pub struct QueuedTask {
    pub id: u64,
    pub priority: Priority,
    pub enqueued_at: Instant,
    /// Bounds queue wait only, never execution.
    pub deadline: Instant,
    pub state: TaskState,
    job: Box<dyn Job>,
    timer: Option<AbortHandle>,
}

impl std::fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("timer_armed", &self.timer.is_some())
            .finish()
    }
}

impl QueuedTask {
    pub(crate) fn new(id: u64, priority: Priority, timeout: Duration, job: Box<dyn Job>) -> Self {
        let enqueued_at = Instant::now();
        Self {
            id,
            priority,
            enqueued_at,
            deadline: instant_after(enqueued_at, timeout),
            state: TaskState::Queued,
            job,
            timer: None,
        }
    }

    /// Check if the task is past its queue-wait deadline. A task popped at
    /// exactly its deadline still runs; its timer covers that instant.
    pub fn is_expired(&self) -> bool {
        Instant::now() > self.deadline
    }

    /// Time spent in the queue so far.
    pub fn waited(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    pub(crate) fn arm_timer(&mut self, handle: AbortHandle) {
        self.timer = Some(handle);
    }

    /// Cancel the wait timer. Taking the handle makes a second call a no-op.
    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub(crate) fn into_job(self) -> Box<dyn Job> {
        self.job
    }
}

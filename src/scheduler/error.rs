//! Submission outcome errors.
//!
//! Every submission ends in exactly one outcome. Overload and queue-wait
//! timeouts are distinct variants so callers can map them to distinct
//! responses; the work's own failure is passed through unchanged.

use std::time::Duration;

use thiserror::Error;

use super::priority::Priority;

/// Errors returned from [`Scheduler::submit`](super::Scheduler::submit).
#[derive(Debug, Error)]
pub enum SubmitError<E> {
    #[error("queue full: {queue_length}/{max} pending, rejected {priority} work")]
    QueueFull {
        priority: Priority,
        queue_length: usize,
        max: usize,
    },

    #[error("timed out after waiting {}ms in queue", .waited.as_millis())]
    Timeout { waited: Duration },

    #[error("removed from queue by administrative clear")]
    Cleared,

    #[error("work failed: {0}")]
    Work(E),

    #[error("execution exceeded {}ms", .limit.as_millis())]
    ExecutionTimeout { limit: Duration },

    #[error("work panicked: {0}")]
    Panicked(String),

    #[error("task dropped before reporting an outcome")]
    Abandoned,
}

impl<E> SubmitError<E> {
    /// Retry-later signal: the scheduler refused or discarded queued work.
    pub fn is_overload(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::Cleared)
    }

    /// The work never left the queue before its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn work_error(&self) -> Option<&E> {
        match self {
            Self::Work(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_work_error(self) -> Option<E> {
        match self {
            Self::Work(e) => Some(e),
            _ => None,
        }
    }
}

/// Type-erased terminal outcome for tasks that never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Abort {
    Timeout { waited: Duration },
    Cleared,
}

impl<E> From<Abort> for SubmitError<E> {
    fn from(abort: Abort) -> Self {
        match abort {
            Abort::Timeout { waited } => Self::Timeout { waited },
            Abort::Cleared => Self::Cleared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_classification() {
        let full: SubmitError<String> = SubmitError::QueueFull {
            priority: Priority::Low,
            queue_length: 4,
            max: 4,
        };
        assert!(full.is_overload());
        assert!(!full.is_timeout());
        assert!(SubmitError::<String>::Cleared.is_overload());

        let timeout: SubmitError<String> = Abort::Timeout { waited: Duration::from_millis(20) }.into();
        assert!(timeout.is_timeout());
        assert!(!timeout.is_overload());
    }

    #[test]
    fn work_error_passes_through() {
        let err: SubmitError<&str> = SubmitError::Work("boom");
        assert_eq!(err.work_error(), Some(&"boom"));
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.into_work_error(), Some("boom"));
    }

    #[test]
    fn display_messages() {
        let full: SubmitError<String> = SubmitError::QueueFull {
            priority: Priority::Normal,
            queue_length: 1,
            max: 1,
        };
        assert!(full.to_string().contains("queue full"));
        assert!(full.to_string().contains("normal"));
        let timeout: SubmitError<String> = SubmitError::Timeout { waited: Duration::from_millis(50) };
        assert!(timeout.to_string().contains("50ms"));
    }
}

//! Priority admission scheduling.
//!
//! Bounds concurrent execution of expensive work, orders waiting work by
//! priority, and sheds or times out excess load with distinct outcomes.

mod error;
mod priority;
mod queue;
mod queued_task;
mod slot;
mod stats;

pub use error::SubmitError;
pub use priority::{EndpointClass, Priority, PriorityQueue};
pub use queue::{Scheduler, SchedulerConfig, SchedulerConfigUpdate, SchedulerStatus};
pub use queued_task::{QueuedTask, TaskState};
pub use stats::{PriorityCounts, SchedulerStats};

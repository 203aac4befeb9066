//! Scheduler statistics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::priority::Priority;
use super::queued_task::TaskState;

/// Submission counts per priority class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub normal: u64,
    pub high: u64,
    pub critical: u64,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::Low => self.low,
            Priority::Normal => self.normal,
            Priority::High => self.high,
            Priority::Critical => self.critical,
        }
    }

    fn bump(&mut self, priority: Priority) {
        let slot = match priority {
            Priority::Low => &mut self.low,
            Priority::Normal => &mut self.normal,
            Priority::High => &mut self.high,
            Priority::Critical => &mut self.critical,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        self.low + self.normal + self.high + self.critical
    }
}

/// Point-in-time scheduler statistics.
///
/// Once every submission has settled,
/// `total_processed + total_rejected + total_timeout == total_submitted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_submitted: u64,
    /// Completed plus failed.
    pub total_processed: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    /// Queue-full rejections plus administrative clears.
    pub total_rejected: u64,
    pub total_timeout: u64,
    pub by_priority: PriorityCounts,
    pub total_wait_ms: f64,
    pub average_wait_ms: f64,
    pub since: DateTime<Utc>,
}

/// Mutable counters owned by the scheduler state.
#[derive(Debug, Clone)]
pub(crate) struct StatsCollector {
    completed: u64,
    failed: u64,
    rejected: u64,
    timeout: u64,
    by_priority: PriorityCounts,
    total_wait: Duration,
    since: DateTime<Utc>,
}

impl StatsCollector {
    pub(crate) fn new() -> Self {
        Self {
            completed: 0,
            failed: 0,
            rejected: 0,
            timeout: 0,
            by_priority: PriorityCounts::default(),
            total_wait: Duration::ZERO,
            since: Utc::now(),
        }
    }

    pub(crate) fn record_submission(&mut self, priority: Priority) {
        self.by_priority.bump(priority);
    }

    pub(crate) fn record_rejection(&mut self) {
        self.rejected += 1;
    }

    pub(crate) fn record_timeout(&mut self) {
        self.timeout += 1;
    }

    /// Record a settled task together with the time it spent queued.
    pub(crate) fn record_settled(&mut self, state: TaskState, waited: Duration) {
        match state {
            TaskState::Completed => self.completed += 1,
            _ => self.failed += 1,
        }
        self.total_wait += waited;
    }

    pub(crate) fn snapshot(&self) -> SchedulerStats {
        let processed = self.completed + self.failed;
        let total_wait_ms = self.total_wait.as_secs_f64() * 1000.0;
        let average_wait_ms = if processed == 0 {
            0.0
        } else {
            total_wait_ms / processed as f64
        };
        SchedulerStats {
            total_submitted: self.by_priority.total(),
            total_processed: processed,
            total_completed: self.completed,
            total_failed: self.failed,
            total_rejected: self.rejected,
            total_timeout: self.timeout,
            by_priority: self.by_priority,
            total_wait_ms,
            average_wait_ms,
            since: self.since,
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

//! Recorders for the `metrics` facade.
//!
//! Calls are no-ops until the host installs a recorder.

use std::time::Duration;

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

use crate::scheduler::Priority;

pub const SCHEDULER_SUBMISSIONS: &str = "arcana_scheduler_submissions_total";
pub const SCHEDULER_OUTCOMES: &str = "arcana_scheduler_outcomes_total";
pub const SCHEDULER_QUEUE_DEPTH: &str = "arcana_scheduler_queue_depth";
pub const SCHEDULER_RUNNING: &str = "arcana_scheduler_running";
pub const SCHEDULER_WAIT_SECONDS: &str = "arcana_scheduler_wait_seconds";
pub const CACHE_LOOKUPS: &str = "arcana_cache_lookups_total";
pub const CACHE_EVICTIONS: &str = "arcana_cache_evictions_total";
pub const CACHE_LOCAL_ITEMS: &str = "arcana_cache_local_items";
pub const CACHE_SHARED_ERRORS: &str = "arcana_cache_shared_errors_total";

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(SCHEDULER_SUBMISSIONS, "Work submitted to the scheduler, by priority");
    describe_counter!(
        SCHEDULER_OUTCOMES,
        "Terminal outcomes: completed, failed, rejected, timeout, cleared"
    );
    describe_gauge!(SCHEDULER_QUEUE_DEPTH, "Tasks waiting for a slot");
    describe_gauge!(SCHEDULER_RUNNING, "Tasks holding a concurrency slot");
    describe_histogram!(SCHEDULER_WAIT_SECONDS, Unit::Seconds, "Queue wait before execution");
    describe_counter!(CACHE_LOOKUPS, "Cache lookups by serving tier: local, shared, miss");
    describe_counter!(CACHE_EVICTIONS, "Local entries evicted for capacity");
    describe_gauge!(CACHE_LOCAL_ITEMS, "Entries held in the local tier");
    describe_counter!(CACHE_SHARED_ERRORS, "Shared-tier calls that failed or timed out");
}

pub fn record_submission(priority: Priority) {
    counter!(SCHEDULER_SUBMISSIONS, "priority" => priority.as_str()).increment(1);
}

pub fn record_outcome(priority: Priority, outcome: &'static str) {
    counter!(SCHEDULER_OUTCOMES, "priority" => priority.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!(SCHEDULER_QUEUE_DEPTH).set(depth as f64);
}

pub fn record_running(running: usize) {
    gauge!(SCHEDULER_RUNNING).set(running as f64);
}

pub fn record_wait_time(priority: Priority, waited: Duration) {
    histogram!(SCHEDULER_WAIT_SECONDS, "priority" => priority.as_str()).record(waited.as_secs_f64());
}

pub fn record_cache_lookup(tier: &'static str) {
    counter!(CACHE_LOOKUPS, "tier" => tier).increment(1);
}

pub fn record_cache_eviction(count: usize) {
    counter!(CACHE_EVICTIONS).increment(count as u64);
}

pub fn record_cache_size(items: usize) {
    gauge!(CACHE_LOCAL_ITEMS).set(items as f64);
}

pub fn record_shared_error(operation: &'static str) {
    counter!(CACHE_SHARED_ERRORS, "operation" => operation).increment(1);
}

//! Arcana CORE
//!
//! Load protection for a request pipeline that fronts expensive work.
//!
//! - [`scheduler`]: priority admission. Bounds concurrent execution, sheds
//!   low-priority load when the queue is full and fails queued work whose
//!   wait deadline passes.
//! - [`cache`]: tiered response cache. A bounded in-process tier with
//!   approximate-LFU eviction reads through to an optional shared tier.
//!
//! The two are independent; [`Runtime`] wires them together for a host
//! process. Routing, persistence and the work itself stay with the caller,
//! which submits opaque futures to the scheduler and opaque bytes to the
//! cache.

pub mod cache;
pub mod cli;
mod clock;
pub mod config;
pub mod scheduler;
pub mod telemetry;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cache::{CacheConfig, SharedTier, TieredCache};
use scheduler::{Scheduler, SchedulerConfig};

/// Runtime configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
}

/// The CORE Runtime instance.
pub struct Runtime {
    pub scheduler: Scheduler,
    pub cache: Arc<TieredCache>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    /// Create a new runtime instance with the given configuration.
    pub fn new(config: RuntimeConfig, shared: Option<Arc<dyn SharedTier>>) -> Self {
        telemetry::describe_metrics();
        Self {
            scheduler: Scheduler::new(config.scheduler),
            cache: Arc::new(TieredCache::new(config.cache, shared)),
            shutdown: CancellationToken::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Start background maintenance. Idempotent; must run inside a Tokio runtime.
    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() || self.shutdown.is_cancelled() {
            return;
        }
        let interval = self.cache.config().sweep_interval;
        *sweeper = Some(self.cache.spawn_sweeper(interval, self.shutdown.child_token()));
        tracing::info!(sweep_interval_secs = interval.as_secs(), "runtime started");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop background maintenance and fail every queued task.
    ///
    /// Running tasks are left to finish. Returns the number of tasks cleared.
    pub async fn shutdown(&self) -> usize {
        self.shutdown.cancel();
        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "cache sweeper ended abnormally");
            }
        }
        let cleared = self.scheduler.clear_queue();
        tracing::info!(cleared, running = self.scheduler.running(), "runtime shut down");
        cleared
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("scheduler", &self.scheduler)
            .field("cache", &self.cache)
            .field("shutting_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cache::MemorySharedTier;
    use crate::scheduler::{Priority, SubmitError};

    #[tokio::test]
    async fn runtime_wires_scheduler_and_cache() {
        let runtime = Runtime::new(RuntimeConfig::default(), Some(Arc::new(MemorySharedTier::new())));
        runtime.start();

        let value = runtime
            .scheduler
            .submit(|| async { Ok::<_, String>(b"reading".to_vec()) }, Priority::Normal, None)
            .await
            .unwrap();
        runtime.cache.set("daily", value, None, None).await;
        assert_eq!(runtime.cache.get("daily").await, Some(b"reading".to_vec()));
        assert!(runtime.cache.stats().shared_tier_enabled);

        assert_eq!(runtime.shutdown().await, 0);
        assert!(runtime.is_shutting_down());
    }

    #[tokio::test]
    async fn shutdown_clears_queued_work() {
        let config = RuntimeConfig {
            scheduler: SchedulerConfig {
                max_concurrent: 1,
                ..SchedulerConfig::default()
            },
            ..RuntimeConfig::default()
        };
        let runtime = Arc::new(Runtime::new(config, None));
        runtime.start();

        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let scheduler = runtime.scheduler.clone();
        let blocker = tokio::spawn(async move {
            scheduler
                .submit(
                    move || async move {
                        let _ = gate.await;
                        Ok::<_, String>(())
                    },
                    Priority::Normal,
                    None,
                )
                .await
        });
        while runtime.scheduler.running() == 0 {
            tokio::task::yield_now().await;
        }

        let scheduler = runtime.scheduler.clone();
        let queued = tokio::spawn(async move {
            scheduler
                .submit(|| async { Ok::<_, String>(()) }, Priority::Low, Some(Duration::from_secs(60)))
                .await
        });
        while runtime.scheduler.queue_len() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(runtime.shutdown().await, 1);
        assert!(matches!(queued.await.unwrap(), Err(SubmitError::Cleared)));

        release.send(()).unwrap();
        assert!(blocker.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn start_after_shutdown_is_noop() {
        let runtime = Runtime::new(RuntimeConfig::default(), None);
        runtime.shutdown().await;
        runtime.start();
        assert!(runtime.sweeper.lock().is_none());
    }
}

//! Telemetry for the load-protection layer.
//!
//! Structured logging through `tracing` and counters/gauges/histograms
//! through the `metrics` facade. No exporter is installed here; the host
//! process picks one.

mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::describe_metrics;

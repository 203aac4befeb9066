//! Runtime configuration loading.
//!
//! Values come from `ARCANA_*` environment variables with sensible defaults.
//! Invalid values fall back to defaults without crashing. An optional TOML
//! file ([`load_with_file`]) supplies the base that the environment then
//! overrides.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ARCANA_MAX_CONCURRENT` | 10 | Max tasks executing at once |
//! | `ARCANA_MAX_QUEUE_SIZE` | 100 | Queue length that rejects sub-HIGH work |
//! | `ARCANA_DEFAULT_TIMEOUT_MS` | 30000 | Queue-wait deadline (ms) |
//! | `ARCANA_EXECUTION_TIMEOUT_MS` | unset | Execution limit (ms), unset or 0 disables |
//! | `ARCANA_LOW_PRIORITY_DELAY_MS` | 100 | Reserved |
//! | `ARCANA_HIGH_PRIORITY_BOOST` | 2 | Reserved |
//! | `ARCANA_CACHE_LOCAL_TTL_SECS` | 300 | Local tier TTL (secs) |
//! | `ARCANA_CACHE_SHARED_TTL_SECS` | 3600 | Shared tier TTL (secs) |
//! | `ARCANA_CACHE_MAX_LOCAL_ITEMS` | 1000 | Local tier capacity |
//! | `ARCANA_CACHE_SHARED_ENABLED` | true | Use the shared tier |
//! | `ARCANA_CACHE_KEY_PREFIX` | `arcana:` | Shared tier namespace |
//! | `ARCANA_CACHE_SHARED_TIMEOUT_MS` | 500 | Bound on each shared tier call (ms) |
//! | `ARCANA_CACHE_SWEEP_INTERVAL_SECS` | 60 | Expiry sweep period (secs) |
//! | `ARCANA_LOG_LEVEL` | info | Log filter directive |
//! | `ARCANA_LOG_FORMAT` | json | `json` or `pretty` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::scheduler::SchedulerConfig;
use crate::telemetry::{LogConfig, LogFormat};
use crate::RuntimeConfig;

pub const MAX_CONCURRENT: &str = "ARCANA_MAX_CONCURRENT";
pub const MAX_QUEUE_SIZE: &str = "ARCANA_MAX_QUEUE_SIZE";
pub const DEFAULT_TIMEOUT_MS: &str = "ARCANA_DEFAULT_TIMEOUT_MS";
pub const EXECUTION_TIMEOUT_MS: &str = "ARCANA_EXECUTION_TIMEOUT_MS";
pub const LOW_PRIORITY_DELAY_MS: &str = "ARCANA_LOW_PRIORITY_DELAY_MS";
pub const HIGH_PRIORITY_BOOST: &str = "ARCANA_HIGH_PRIORITY_BOOST";
pub const CACHE_LOCAL_TTL_SECS: &str = "ARCANA_CACHE_LOCAL_TTL_SECS";
pub const CACHE_SHARED_TTL_SECS: &str = "ARCANA_CACHE_SHARED_TTL_SECS";
pub const CACHE_MAX_LOCAL_ITEMS: &str = "ARCANA_CACHE_MAX_LOCAL_ITEMS";
pub const CACHE_SHARED_ENABLED: &str = "ARCANA_CACHE_SHARED_ENABLED";
pub const CACHE_KEY_PREFIX: &str = "ARCANA_CACHE_KEY_PREFIX";
pub const CACHE_SHARED_TIMEOUT_MS: &str = "ARCANA_CACHE_SHARED_TIMEOUT_MS";
pub const CACHE_SWEEP_INTERVAL_SECS: &str = "ARCANA_CACHE_SWEEP_INTERVAL_SECS";
pub const LOG_LEVEL: &str = "ARCANA_LOG_LEVEL";
pub const LOG_FORMAT: &str = "ARCANA_LOG_FORMAT";

/// Every variable this module reads.
pub const ENV_KEYS: &[&str] = &[
    MAX_CONCURRENT,
    MAX_QUEUE_SIZE,
    DEFAULT_TIMEOUT_MS,
    EXECUTION_TIMEOUT_MS,
    LOW_PRIORITY_DELAY_MS,
    HIGH_PRIORITY_BOOST,
    CACHE_LOCAL_TTL_SECS,
    CACHE_SHARED_TTL_SECS,
    CACHE_MAX_LOCAL_ITEMS,
    CACHE_SHARED_ENABLED,
    CACHE_KEY_PREFIX,
    CACHE_SHARED_TIMEOUT_MS,
    CACHE_SWEEP_INTERVAL_SECS,
    LOG_LEVEL,
    LOG_FORMAT,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Effective runtime configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub max_concurrent: usize,
    pub max_queue_size: usize,
    pub default_timeout_ms: u64,
    pub execution_timeout_ms: Option<u64>,
    pub low_priority_delay_ms: u64,
    pub high_priority_boost: u32,
    pub cache_local_ttl_secs: u64,
    pub cache_shared_ttl_secs: u64,
    pub cache_max_local_items: usize,
    pub cache_shared_enabled: bool,
    pub cache_key_prefix: String,
    pub cache_shared_timeout_ms: u64,
    pub cache_sweep_interval_secs: u64,
    pub log_level: String,
    pub log_format: String,
}

impl EffectiveConfig {
    /// `(variable, value)` pairs in table order. Unset values render empty.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (MAX_CONCURRENT, self.max_concurrent.to_string()),
            (MAX_QUEUE_SIZE, self.max_queue_size.to_string()),
            (DEFAULT_TIMEOUT_MS, self.default_timeout_ms.to_string()),
            (
                EXECUTION_TIMEOUT_MS,
                self.execution_timeout_ms.map(|ms| ms.to_string()).unwrap_or_default(),
            ),
            (LOW_PRIORITY_DELAY_MS, self.low_priority_delay_ms.to_string()),
            (HIGH_PRIORITY_BOOST, self.high_priority_boost.to_string()),
            (CACHE_LOCAL_TTL_SECS, self.cache_local_ttl_secs.to_string()),
            (CACHE_SHARED_TTL_SECS, self.cache_shared_ttl_secs.to_string()),
            (CACHE_MAX_LOCAL_ITEMS, self.cache_max_local_items.to_string()),
            (CACHE_SHARED_ENABLED, self.cache_shared_enabled.to_string()),
            (CACHE_KEY_PREFIX, self.cache_key_prefix.clone()),
            (CACHE_SHARED_TIMEOUT_MS, self.cache_shared_timeout_ms.to_string()),
            (CACHE_SWEEP_INTERVAL_SECS, self.cache_sweep_interval_secs.to_string()),
            (LOG_LEVEL, self.log_level.clone()),
            (LOG_FORMAT, self.log_format.clone()),
        ]
    }
}

/// All runtime configuration after defaults, file and environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            cache: CacheConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

/// Optional TOML layer. Absent keys keep the defaults.
///
/// ```toml
/// [scheduler]
/// max_concurrent = 4
/// execution_timeout_ms = 10000
///
/// [cache]
/// key_prefix = "readings:"
///
/// [logging]
/// format = "pretty"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    scheduler: FileScheduler,
    cache: FileCache,
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileScheduler {
    max_concurrent: Option<usize>,
    max_queue_size: Option<usize>,
    default_timeout_ms: Option<u64>,
    execution_timeout_ms: Option<u64>,
    low_priority_delay_ms: Option<u64>,
    high_priority_boost: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileCache {
    local_ttl_secs: Option<u64>,
    shared_ttl_secs: Option<u64>,
    max_local_items: Option<usize>,
    shared_enabled: Option<bool>,
    key_prefix: Option<String>,
    shared_timeout_ms: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileLogging {
    level: Option<String>,
    format: Option<String>,
}

impl FileConfig {
    fn apply(self, base: &mut EnvConfig) {
        let s = self.scheduler;
        let sched = &mut base.scheduler;
        if let Some(v) = s.max_concurrent {
            sched.max_concurrent = v;
        }
        if let Some(v) = s.max_queue_size {
            sched.max_queue_size = v;
        }
        if let Some(v) = s.default_timeout_ms {
            sched.default_timeout = Duration::from_millis(v);
        }
        if let Some(v) = s.execution_timeout_ms {
            sched.execution_timeout = (v > 0).then(|| Duration::from_millis(v));
        }
        if let Some(v) = s.low_priority_delay_ms {
            sched.low_priority_delay = Duration::from_millis(v);
        }
        if let Some(v) = s.high_priority_boost {
            sched.high_priority_boost = v;
        }

        let c = self.cache;
        let cache = &mut base.cache;
        if let Some(v) = c.local_ttl_secs {
            cache.default_local_ttl = Duration::from_secs(v);
        }
        if let Some(v) = c.shared_ttl_secs {
            cache.default_shared_ttl = Duration::from_secs(v);
        }
        if let Some(v) = c.max_local_items {
            cache.max_local_items = v;
        }
        if let Some(v) = c.shared_enabled {
            cache.shared_tier_enabled = v;
        }
        if let Some(v) = c.key_prefix {
            cache.key_prefix = v;
        }
        if let Some(v) = c.shared_timeout_ms {
            cache.shared_timeout = Duration::from_millis(v);
        }
        if let Some(v) = c.sweep_interval_secs {
            cache.sweep_interval = Duration::from_secs(v);
        }

        if let Some(level) = self.logging.level {
            base.log_level = level;
        }
        if let Some(format) = self.logging.format.and_then(|f| f.parse().ok()) {
            base.log_format = format;
        }
    }
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn parse_string(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val,
        _ => default,
    }
}

fn duration_ms(key: &str, default: Duration, floor_ms: u64) -> Duration {
    let ms = parse_u64(key, default.as_millis() as u64).max(floor_ms);
    Duration::from_millis(ms)
}

fn duration_secs(key: &str, default: Duration, floor_secs: u64) -> Duration {
    let secs = parse_u64(key, default.as_secs()).max(floor_secs);
    Duration::from_secs(secs)
}

/// Load scheduler configuration from environment over `base`.
fn load_scheduler_config(base: SchedulerConfig) -> SchedulerConfig {
    let max_concurrent = parse_usize(MAX_CONCURRENT, base.max_concurrent).max(1);
    // 0 is meaningful: only HIGH/CRITICAL work is admitted.
    let max_queue_size = parse_usize(MAX_QUEUE_SIZE, base.max_queue_size);
    let default_timeout = duration_ms(DEFAULT_TIMEOUT_MS, base.default_timeout, 1);
    let execution_timeout = match std::env::var(EXECUTION_TIMEOUT_MS) {
        Ok(val) => match val.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(ms) => Some(Duration::from_millis(ms)),
            Err(_) => base.execution_timeout,
        },
        Err(_) => base.execution_timeout,
    };
    let low_priority_delay = duration_ms(LOW_PRIORITY_DELAY_MS, base.low_priority_delay, 0);
    let high_priority_boost = parse_u32(HIGH_PRIORITY_BOOST, base.high_priority_boost);
    SchedulerConfig {
        max_concurrent,
        max_queue_size,
        default_timeout,
        execution_timeout,
        low_priority_delay,
        high_priority_boost,
    }
}

/// Load cache configuration from environment over `base`.
fn load_cache_config(base: CacheConfig) -> CacheConfig {
    let default_local_ttl = duration_secs(CACHE_LOCAL_TTL_SECS, base.default_local_ttl, 1);
    let default_shared_ttl = duration_secs(CACHE_SHARED_TTL_SECS, base.default_shared_ttl, 1);
    let max_local_items = parse_usize(CACHE_MAX_LOCAL_ITEMS, base.max_local_items).max(1);
    let shared_tier_enabled = parse_bool(CACHE_SHARED_ENABLED, base.shared_tier_enabled);
    let key_prefix = parse_string(CACHE_KEY_PREFIX, base.key_prefix);
    let shared_timeout = duration_ms(CACHE_SHARED_TIMEOUT_MS, base.shared_timeout, 1);
    let sweep_interval = duration_secs(CACHE_SWEEP_INTERVAL_SECS, base.sweep_interval, 1);
    CacheConfig {
        default_local_ttl,
        default_shared_ttl,
        max_local_items,
        shared_tier_enabled,
        key_prefix,
        shared_timeout,
        sweep_interval,
    }
}

fn load_over(base: EnvConfig) -> EnvConfig {
    let log_format = match std::env::var(LOG_FORMAT) {
        Ok(val) => val.parse().unwrap_or(base.log_format),
        Err(_) => base.log_format,
    };
    EnvConfig {
        scheduler: load_scheduler_config(base.scheduler),
        cache: load_cache_config(base.cache),
        log_level: parse_string(LOG_LEVEL, base.log_level),
        log_format,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    load_over(EnvConfig::default())
}

/// Load a TOML file as the base, then apply environment overrides.
pub fn load_with_file(path: impl AsRef<Path>) -> Result<EnvConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: FileConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut base = EnvConfig::default();
    file.apply(&mut base);
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(load_over(base))
}

impl EnvConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_concurrent: self.scheduler.max_concurrent,
            max_queue_size: self.scheduler.max_queue_size,
            default_timeout_ms: self.scheduler.default_timeout.as_millis() as u64,
            execution_timeout_ms: self.scheduler.execution_timeout.map(|d| d.as_millis() as u64),
            low_priority_delay_ms: self.scheduler.low_priority_delay.as_millis() as u64,
            high_priority_boost: self.scheduler.high_priority_boost,
            cache_local_ttl_secs: self.cache.default_local_ttl.as_secs(),
            cache_shared_ttl_secs: self.cache.default_shared_ttl.as_secs(),
            cache_max_local_items: self.cache.max_local_items,
            cache_shared_enabled: self.cache.shared_tier_enabled,
            cache_key_prefix: self.cache.key_prefix.clone(),
            cache_shared_timeout_ms: self.cache.shared_timeout.as_millis() as u64,
            cache_sweep_interval_secs: self.cache.sweep_interval.as_secs(),
            log_level: self.log_level.clone(),
            log_format: match self.log_format {
                LogFormat::Json => "json".to_string(),
                LogFormat::Pretty => "pretty".to_string(),
            },
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            scheduler: self.scheduler.clone(),
            cache: self.cache.clone(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            output_path: None,
        }
    }

    /// Combinations that load fine but are probably mistakes.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.scheduler.max_queue_size == 0 {
            warnings.push(format!(
                "{MAX_QUEUE_SIZE} is 0; LOW and NORMAL work will always be rejected"
            ));
        }
        if let Some(limit) = self.scheduler.execution_timeout {
            if limit < self.cache.shared_timeout {
                warnings.push(format!(
                    "{EXECUTION_TIMEOUT_MS} ({}) is below {CACHE_SHARED_TIMEOUT_MS} ({})",
                    limit.as_millis(),
                    self.cache.shared_timeout.as_millis()
                ));
            }
        }
        if self.cache.default_local_ttl > self.cache.default_shared_ttl {
            warnings.push(format!(
                "{CACHE_LOCAL_TTL_SECS} ({}) exceeds {CACHE_SHARED_TTL_SECS} ({}); local entries outlive the shared tier",
                self.cache.default_local_ttl.as_secs(),
                self.cache.default_shared_ttl.as_secs()
            ));
        }
        if self.cache.shared_timeout >= self.scheduler.default_timeout {
            warnings.push(format!(
                "{CACHE_SHARED_TIMEOUT_MS} ({}) is not below {DEFAULT_TIMEOUT_MS} ({})",
                self.cache.shared_timeout.as_millis(),
                self.scheduler.default_timeout.as_millis()
            ));
        }
        warnings
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    pub(crate) static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.scheduler.max_concurrent, 10);
        assert_eq!(cfg.scheduler.max_queue_size, 100);
        assert_eq!(cfg.scheduler.default_timeout, Duration::from_secs(30));
        assert_eq!(cfg.scheduler.execution_timeout, None);
        assert_eq!(cfg.scheduler.low_priority_delay, Duration::from_millis(100));
        assert_eq!(cfg.scheduler.high_priority_boost, 2);
        assert_eq!(cfg.cache.default_local_ttl, Duration::from_secs(300));
        assert_eq!(cfg.cache.default_shared_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.cache.max_local_items, 1000);
        assert!(cfg.cache.shared_tier_enabled);
        assert_eq!(cfg.cache.key_prefix, "arcana:");
        assert_eq!(cfg.cache.shared_timeout, Duration::from_millis(500));
        assert_eq!(cfg.cache.sweep_interval, Duration::from_secs(60));
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg, EnvConfig::default());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var(MAX_CONCURRENT, "4");
        std::env::set_var(MAX_QUEUE_SIZE, "25");
        std::env::set_var(EXECUTION_TIMEOUT_MS, "8000");
        std::env::set_var(CACHE_SHARED_ENABLED, "false");
        std::env::set_var(CACHE_KEY_PREFIX, "readings:");
        std::env::set_var(LOG_FORMAT, "pretty");
        let cfg = load();
        assert_eq!(cfg.scheduler.max_concurrent, 4);
        assert_eq!(cfg.scheduler.max_queue_size, 25);
        assert_eq!(cfg.scheduler.execution_timeout, Some(Duration::from_secs(8)));
        assert!(!cfg.cache.shared_tier_enabled);
        assert_eq!(cfg.cache.key_prefix, "readings:");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var(MAX_CONCURRENT, "lots");
        std::env::set_var(DEFAULT_TIMEOUT_MS, "-5");
        std::env::set_var(CACHE_SHARED_ENABLED, "maybe");
        std::env::set_var(LOG_FORMAT, "xml");
        std::env::set_var(EXECUTION_TIMEOUT_MS, "soon");
        let cfg = load();
        assert_eq!(cfg.scheduler.max_concurrent, 10);
        assert_eq!(cfg.scheduler.default_timeout, Duration::from_secs(30));
        assert!(cfg.cache.shared_tier_enabled);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.scheduler.execution_timeout, None);
        clear_env_vars();
    }

    #[test]
    fn test_floors_apply() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var(MAX_CONCURRENT, "0");
        std::env::set_var(MAX_QUEUE_SIZE, "0");
        std::env::set_var(CACHE_MAX_LOCAL_ITEMS, "0");
        std::env::set_var(CACHE_SHARED_TIMEOUT_MS, "0");
        std::env::set_var(EXECUTION_TIMEOUT_MS, "0");
        let cfg = load();
        assert_eq!(cfg.scheduler.max_concurrent, 1);
        assert_eq!(cfg.scheduler.max_queue_size, 0, "zero queue size is honored");
        assert_eq!(cfg.cache.max_local_items, 1);
        assert_eq!(cfg.cache.shared_timeout, Duration::from_millis(1));
        assert_eq!(cfg.scheduler.execution_timeout, None);
        clear_env_vars();
    }

    #[test]
    fn test_file_layer_under_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[scheduler]
max_concurrent = 3
execution_timeout_ms = 2500

[cache]
key_prefix = "file:"
max_local_items = 50

[logging]
format = "pretty"
"#
        )
        .unwrap();

        std::env::set_var(MAX_CONCURRENT, "7");
        let cfg = load_with_file(file.path()).unwrap();
        assert_eq!(cfg.scheduler.max_concurrent, 7, "env wins over file");
        assert_eq!(cfg.scheduler.execution_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(cfg.cache.key_prefix, "file:");
        assert_eq!(cfg.cache.max_local_items, 50);
        assert_eq!(cfg.scheduler.max_queue_size, 100);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_file_errors_are_reported() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let missing = load_with_file("/nonexistent/arcana.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler]\nmax_concurent = 3").unwrap();
        let typo = load_with_file(file.path()).unwrap_err();
        assert!(matches!(typo, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_effective_config_round_trips_through_env_pairs() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let eff = load().effective_config();
        let pairs = eff.env_pairs();
        assert_eq!(pairs.len(), ENV_KEYS.len());
        for ((key, _), expected) in pairs.iter().zip(ENV_KEYS) {
            assert_eq!(key, expected);
        }
        assert_eq!(eff.execution_timeout_ms, None);
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["max_concurrent"], 10);
        assert_eq!(json["cache_key_prefix"], "arcana:");
    }

    #[test]
    fn test_warnings_flag_suspicious_combinations() {
        assert!(EnvConfig::default().warnings().is_empty());

        let mut cfg = EnvConfig::default();
        cfg.scheduler.max_queue_size = 0;
        cfg.cache.default_local_ttl = Duration::from_secs(7200);
        let warnings = cfg.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains(MAX_QUEUE_SIZE));
        assert!(warnings[1].contains(CACHE_LOCAL_TTL_SECS));
    }
}

//! CLI module for arcana-core commands.
//!
//! ## Usage
//!
//! ```bash
//! arcana-core run                 # Start the runtime until Ctrl+C
//! arcana-core config show         # Effective configuration
//! arcana-core config defaults     # Built-in defaults
//! arcana-core config validate     # Warn about suspicious settings
//! ```

pub mod config_cmd;

use std::path::PathBuf;

/// Environment variable naming a TOML config file.
pub const CONFIG_FILE_ENV: &str = "ARCANA_CONFIG_FILE";

/// Config file from `--file PATH` in `args`, else from [`CONFIG_FILE_ENV`].
pub fn config_file(args: &[String]) -> Option<PathBuf> {
    let flag = args
        .iter()
        .position(|arg| arg == "--file" || arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);
    flag.or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from))
}

//! arcana-core entry point.
//!
//! ## CLI Subcommands
//!
//! - `arcana-core` or `arcana-core run` - Start the runtime until Ctrl+C
//! - `arcana-core config show|defaults|validate` - Inspect configuration
//! - `arcana-core version` - Print version

use std::process::ExitCode;
use std::sync::Arc;

use arcana_core::cache::{MemorySharedTier, SharedTier};
use arcana_core::cli::{config_cmd, config_file};
use arcana_core::config::{self as arcana_config, EnvConfig};
use arcana_core::telemetry::init_logging;
use arcana_core::Runtime;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");

    match command {
        "run" | "" => match run(&args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Runtime error: {}", e);
                ExitCode::FAILURE
            }
        },
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            let file = config_file(&args);
            match subcommand {
                "show" => {
                    let json = args.iter().any(|a| a == "--json");
                    ExitCode::from(config_cmd::run_show(file.as_deref(), json) as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate(file.as_deref()) as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("arcana-core {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "arcana-core - priority admission and tiered caching v{}

USAGE:
    arcana-core [COMMAND] [OPTIONS]

COMMANDS:
    run          Start the runtime (default when no command given)
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help       Show help for command
    -V, --version    Show version information
    --file PATH      Load a TOML config file under the environment

ENVIRONMENT:
    ARCANA_CONFIG_FILE   TOML config file (same as --file)
    ARCANA_*             Individual settings; see `arcana-core config defaults`

EXIT CODES:
    0  Success
    1  Failure / configuration warnings
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "arcana-core run - Start the runtime

USAGE:
    arcana-core run [--file PATH]

DESCRIPTION:
    Builds the scheduler and an in-process tiered cache, starts the
    expiry sweeper and waits for Ctrl+C. On shutdown queued work is
    cleared and running work is left to finish.
"
            );
        }
        "config" => {
            eprintln!(
                "arcana-core config - Inspect configuration

USAGE:
    arcana-core config <SUBCOMMAND> [--file PATH]

SUBCOMMANDS:
    show [--json]  Show effective configuration
    defaults       Show built-in defaults
    validate       Warn about suspicious settings (exit 1 on warnings)

EXAMPLES:
    arcana-core config show --json
    arcana-core config validate --file /etc/arcana/config.toml
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'arcana-core help' for general usage.",
                command
            );
        }
    }
}

fn load_config(args: &[String]) -> Result<EnvConfig, arcana_config::ConfigError> {
    match config_file(args) {
        Some(path) => arcana_config::load_with_file(path),
        None => Ok(arcana_config::load()),
    }
}

async fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let env = load_config(args)?;
    init_logging(&env.log_config())?;
    for warning in env.warnings() {
        tracing::warn!("{}", warning);
    }

    let shared: Option<Arc<dyn SharedTier>> = if env.cache.shared_tier_enabled {
        Some(Arc::new(MemorySharedTier::new()))
    } else {
        None
    };
    let runtime = Runtime::new(env.runtime_config(), shared);
    runtime.start();
    tracing::info!(
        max_concurrent = env.scheduler.max_concurrent,
        max_queue_size = env.scheduler.max_queue_size,
        max_local_items = env.cache.max_local_items,
        "arcana-core ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    let cleared = runtime.shutdown().await;
    let stats = runtime.scheduler.stats();
    let cache = runtime.cache.stats();
    tracing::info!(
        cleared,
        submitted = stats.total_submitted,
        processed = stats.total_processed,
        cache_hit_rate = cache.hit_rate(),
        "shutdown complete"
    );
    Ok(())
}

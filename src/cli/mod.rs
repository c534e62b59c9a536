// CLI module - User-facing command-line interface

mod output;

use crate::config::SupervisorConfig;
use crate::daemon::Daemon;
use crate::error::{Result, SupervisorError};
use crate::logs::{rotate_logs, LogFileSet};
use crate::process::query_version;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Supervisor for a long-running proxy core
#[derive(Parser)]
#[command(name = "proxy-supervisor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the core and supervise it until SIGINT or SIGTERM
    Run {
        /// Path to the supervisor configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Rotate the IP-limit logs once and exit
    RotateLogs {
        /// Path to the supervisor configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Validate the configuration and print the resulting layout
    CheckConfig {
        /// Path to the supervisor configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Execute the parsed command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { config } => {
                let config = SupervisorConfig::from_file(&config)?;
                Daemon::new(config)?.run().await
            }

            Commands::RotateLogs { config } => {
                let config = SupervisorConfig::from_file(&config)?;
                let report = rotate_logs(&LogFileSet::ip_limit(&config.log_dir)).await;
                output::print_rotation_report(&report);

                if report.failed > 0 {
                    return Err(SupervisorError::LogFileUnavailable(format!(
                        "{} log file(s) could not be rotated",
                        report.failed
                    )));
                }
                Ok(())
            }

            Commands::CheckConfig { config: path } => {
                let config = SupervisorConfig::from_file(&path)?;
                let layout = config.layout();
                let version = if layout.binary_path.exists() {
                    Some(query_version(&layout.binary_path).await)
                } else {
                    None
                };

                output::print_success_msg(&format!("{} is valid", path.display()));
                output::print_layout(&config, &layout, version.as_deref());
                Ok(())
            }
        }
    }
}

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins unless `verbose` is set; the default level is `info`.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Already installed when embedded in a host that set its own
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

//! Waymark - in-page guidance tooling
//!
//! Entry point for the Waymark CLI. Commands run against a local extension
//! instance: the same background service and message bus the browser side
//! uses, driven from the popup's seat.

mod cli;
mod cmd_config;
mod cmd_guidance;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use waymark_bus::Extension;
use waymark_config::{default_config_path, waymark_dir, ConfigStore};

use crate::cli::{Cli, Commands};

/// Console and file filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.waymark/logs/ with daily rotation.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = waymark_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("waymark")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Open the configuration store and start an extension on it.
fn start_extension(config: Option<PathBuf>) -> Result<(Arc<ConfigStore>, Extension), Box<dyn std::error::Error>> {
    let path = config.unwrap_or_else(default_config_path);
    debug!("Using config at {}", path.display());
    let store = Arc::new(ConfigStore::open(path)?);
    let extension = Extension::start(Arc::clone(&store));
    Ok((store, extension))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Match { pattern, url } => cmd_guidance::match_pattern(&pattern, &url),
        Commands::Config { action } => {
            let (store, extension) = start_extension(cli.config)?;
            cmd_config::handle_config_command(action, &store, &extension).await
        }
        Commands::Validate { offline } => {
            let (store, extension) = start_extension(cli.config)?;
            cmd_guidance::validate(&store, &extension, offline).await
        }
        Commands::Guidance { url, lang, format } => {
            let (_, extension) = start_extension(cli.config)?;
            cmd_guidance::list_guidance(&extension, &url, lang, &format).await
        }
    }
}

//! AMS CLI - client management dashboard

mod commands;
mod config;
mod logging;
mod state_dir;

use ams_http::{AmsClient, FileCredentialStore};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use commands::{Commands, Output};
use config::Settings;
use state_dir::StateDir;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "ams")]
#[command(about = "Client management dashboard for the AMS backend")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (defaults to config.toml in the config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Directory for configuration and session data
    #[arg(short = 'd', long, global = true, env = state_dir::STATE_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Print results and logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.log_level.into(), cli.json)?;

    let state_dir = StateDir::resolve(cli.data_dir);
    let settings = Settings::load(cli.config.as_deref(), &state_dir)?;
    let client = build_client(&settings, &state_dir)?;

    match cli.command.execute(&client, Output::new(cli.json)).await {
        Ok(()) => {
            debug!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn build_client(settings: &Settings, state_dir: &StateDir) -> Result<AmsClient> {
    let session_path = settings.session_path(state_dir);
    debug!(session = %session_path.display(), base_url = %settings.api.base_url, "Using backend");

    AmsClient::builder()
        .base_url(&settings.api.base_url)
        .timeout(settings.request_timeout())
        .refresh_timeout(settings.refresh_timeout())
        .credential_store(Arc::new(FileCredentialStore::new(session_path)))
        .on_session_expired(|| {
            eprintln!("Session expired. Run `ams login <username>` to sign in again.");
        })
        .build()
        .context("Failed to create API client")
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

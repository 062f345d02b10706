//! CLI configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `AMS_*` environment variables (`__` separates nested
//! keys, e.g. `AMS_API__BASE_URL`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state_dir::StateDir;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AMS";

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Top-level CLI settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Backend API settings
    pub api: ApiSettings,

    /// Session persistence settings
    #[serde(default)]
    pub session: SessionSettings,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL every request path is appended to
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Upper bound on a token refresh exchange in seconds
    pub refresh_timeout_secs: u64,
}

/// Session persistence settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Session file; defaults to `session.json` in the data directory
    pub file: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            refresh_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Load settings from `file` (or the state directory's `config.toml` if
    /// present) and the process environment
    pub fn load(file: Option<&Path>, state_dir: &StateDir) -> Result<Self> {
        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::build(file, state_dir, environment)
    }

    fn build(
        file: Option<&Path>,
        state_dir: &StateDir,
        environment: config::Environment,
    ) -> Result<Self> {
        let defaults = ApiSettings::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.base_url)?
            .set_default("api.timeout_secs", defaults.timeout_secs)?
            .set_default("api.refresh_timeout_secs", defaults.refresh_timeout_secs)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::from(state_dir.config_path()).required(false)),
        };

        let settings = builder
            .add_source(environment)
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Where the session is persisted
    pub fn session_path(&self, state_dir: &StateDir) -> PathBuf {
        self.session
            .file
            .clone()
            .unwrap_or_else(|| state_dir.session_path())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.api.refresh_timeout_secs)
    }
}

//! Configuration module.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `GAMETRACK_PROVIDERS` | No | (none) | Comma-separated provider selectors (`mixpanel`, `console`) |
//! | `GAMETRACK_MIXPANEL_TOKEN` | If `mixpanel` selected | - | Mixpanel project token |
//! | `GAMETRACK_MIXPANEL_URL` | No | `https://api.mixpanel.com` | Ingestion API base URL |
//! | `GAMETRACK_DISTINCT_ID` | No | hostname | Identity attached to every Mixpanel event |
//! | `GAMETRACK_STATE_PATH` | No | `~/.gametrack/state.json` | Launch counter state file |
//! | `GAMETRACK_BATCH_SIZE` | No | 50 | Transport batch size (must be > 0) |
//!
//! Leaving `GAMETRACK_PROVIDERS` unset (or set to `none`) is valid
//! configuration: the failure is raised by the provider registry at the
//! first tracking call, not here.

use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use thiserror::Error;

/// Default transport batch size.
const DEFAULT_BATCH_SIZE: usize = 50;

/// Default state directory name relative to home.
const DEFAULT_STATE_DIR: &str = ".gametrack";

/// Default state file name.
const DEFAULT_STATE_FILE: &str = "state.json";

/// Default Mixpanel ingestion base URL.
const DEFAULT_MIXPANEL_URL: &str = "https://api.mixpanel.com";

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Mixpanel provider and its transport.
#[derive(Debug, Clone)]
pub struct MixpanelConfig {
    /// Ingestion API base URL (e.g. `https://api.mixpanel.com`).
    pub api_url: String,

    /// Project token attached to every event.
    pub token: String,

    /// Number of buffered events that triggers a batch delivery.
    pub batch_size: usize,
}

/// Configuration for the tracking facade and its providers.
#[derive(Debug, Clone)]
pub struct Config {
    /// Provider selectors, in configuration order, lowercased.
    /// Resolved lazily by the registry at the first tracking call.
    pub providers: Vec<String>,

    /// Identity attached to every Mixpanel event.
    pub distinct_id: String,

    /// Location of the launch counter state file.
    pub state_path: PathBuf,

    /// Mixpanel settings; present only when the `mixpanel` selector is
    /// configured.
    pub mixpanel: Option<MixpanelConfig>,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `mixpanel` is selected but `GAMETRACK_MIXPANEL_TOKEN` is not set
    /// - `GAMETRACK_BATCH_SIZE` is set but is not a positive integer
    /// - The home directory cannot be determined (needed for default paths)
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let home_dir = base_dirs.home_dir();

        // Optional: GAMETRACK_PROVIDERS (default: none configured)
        let providers: Vec<String> = env::var("GAMETRACK_PROVIDERS")
            .map(|val| {
                val.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        // Optional: GAMETRACK_DISTINCT_ID (default: hostname)
        let distinct_id = env::var("GAMETRACK_DISTINCT_ID").unwrap_or_else(|_| get_hostname());

        // Optional: GAMETRACK_STATE_PATH (default: ~/.gametrack/state.json)
        let state_path = env::var("GAMETRACK_STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir.join(DEFAULT_STATE_DIR).join(DEFAULT_STATE_FILE));

        // Optional: GAMETRACK_BATCH_SIZE (default: 50, must be > 0)
        let batch_size = match env::var("GAMETRACK_BATCH_SIZE") {
            Ok(val) => {
                let size = val
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "GAMETRACK_BATCH_SIZE".to_string(),
                        message: format!("expected positive integer, got '{val}'"),
                    })?;
                if size == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "GAMETRACK_BATCH_SIZE".to_string(),
                        message: "batch size must be greater than 0".to_string(),
                    });
                }
                size
            }
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        // Mixpanel settings are only parsed when the selector is present,
        // so a console-only setup needs no token.
        let mixpanel = if providers.iter().any(|p| p == "mixpanel") {
            let token = env::var("GAMETRACK_MIXPANEL_TOKEN")
                .map_err(|_| ConfigError::MissingEnvVar("GAMETRACK_MIXPANEL_TOKEN".to_string()))?;

            let api_url = env::var("GAMETRACK_MIXPANEL_URL")
                .unwrap_or_else(|_| DEFAULT_MIXPANEL_URL.to_string());

            Some(MixpanelConfig {
                api_url,
                token,
                batch_size,
            })
        } else {
            None
        };

        Ok(Self {
            providers,
            distinct_id,
            state_path,
            mixpanel,
        })
    }
}

/// Gets the system hostname, falling back to "unknown" if it cannot be determined.
fn get_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_string())
}

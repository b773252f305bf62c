pub mod paths;
pub mod server;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use paths::PathConfig;
pub use server::{FetchConfig, ServerConfig};

pub const ENV_MODELS_DIR: &str = "QA_MODELS_DIR";
pub const ENV_SERVER_BINARY: &str = "QA_SERVER_BINARY";
pub const ENV_SERVER_HOST: &str = "QA_SERVER_HOST";
pub const ENV_SERVER_PORT: &str = "QA_SERVER_PORT";
pub const ENV_FETCH_BINARY: &str = "QA_FETCH_BINARY";

/// Main configuration, read once at startup and passed down explicitly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathConfig,
    pub server: ServerConfig,
    pub fetch: FetchConfig,
}

impl Config {
    /// Defaults, overlaid with a JSON file if given, then with `QA_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_MODELS_DIR) {
            self.paths.models_dir = dir;
        }
        if let Some(binary) = lookup(ENV_SERVER_BINARY) {
            self.server.binary = binary;
        }
        if let Some(host) = lookup(ENV_SERVER_HOST) {
            self.server.host = host;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SERVER_PORT} is not a valid port: {port}"))?;
        }
        if let Some(binary) = lookup(ENV_FETCH_BINARY) {
            self.fetch.binary = binary;
        }
        Ok(())
    }
}

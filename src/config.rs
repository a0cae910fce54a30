//! Service configuration loaded from TOML with env-var and default fallback.
//!
//! Search order:
//!   1. `INSIGHTPIPE_CONFIG` env var pointing at a TOML file
//!   2. `./insightpipe.toml`
//!   3. built-in defaults
//!
//! The inference API key is never read from the file; it comes from
//! `INSIGHTPIPE_API_KEY` (or the `api_key_env` override) at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({0}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({0}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("config validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080".
    pub bind_address: String,
    /// Directory for the sled database.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: PathBuf::from("./insightpipe-data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// OpenAI-compatible chat completions endpoint base.
    pub base_url: String,
    pub model: String,
    /// Env var holding the API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
    /// Transient-failure attempts per inference call.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds; doubles on each retry.
    pub backoff_base_ms: u64,
    /// Minimum completed-participant responses before synthesis runs.
    pub min_responses: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "INSIGHTPIPE_API_KEY".to_string(),
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 250,
            min_responses: 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load using the standard search order, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("INSIGHTPIPE_CONFIG") {
            let p = PathBuf::from(&path);
            match Self::load_from_file(&p) {
                Ok(config) => {
                    info!(path = %p.display(), "loaded config from INSIGHTPIPE_CONFIG");
                    return config;
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "failed to load config from INSIGHTPIPE_CONFIG, falling back");
                }
            }
        }

        let local = PathBuf::from("insightpipe.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("loaded config from ./insightpipe.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "failed to load ./insightpipe.toml, using defaults");
                }
            }
        }

        info!("no insightpipe.toml found, using built-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind_address {:?} is not a valid socket address",
                self.server.bind_address
            )));
        }
        if self.inference.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "inference.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.inference.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "inference.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.request_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.inference.backoff_base_ms)
    }

    /// Resolve the inference API key from the configured env var.
    pub fn api_key(&self) -> String {
        std::env::var(&self.inference.api_key_env).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.inference.max_attempts, 3);
        assert_eq!(config.inference.min_responses, 1);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [inference]
            model = "gpt-4o"
            backoff_base_ms = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.inference.model, "gpt-4o");
        assert_eq!(config.inference.backoff_base_ms, 100);
        assert_eq!(config.server.data_dir, PathBuf::from("./insightpipe-data"));
    }

    #[test]
    fn test_validation_rejects_bad_bind_address() {
        let mut config = Config::default();
        config.server.bind_address = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = Config::default();
        config.inference.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}

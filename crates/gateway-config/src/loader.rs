//! Configuration loading.
//!
//! Loads YAML, TOML or JSON from a file or string, substitutes `${VAR}` /
//! `${VAR:-default}` environment references, applies prefixed environment
//! overrides and validates the result.

use crate::schema::GatewayConfig;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Missing path
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation failure
    #[error("configuration validation failed: {0}")]
    Validation(String),

    /// Unknown file extension
    #[error("unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// Unrecognized extension
        extension: String,
    },
}

/// A configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Load from a file path, format chosen by extension
    File(String),
    /// Raw YAML
    Yaml(String),
    /// Raw TOML
    Toml(String),
    /// Raw JSON
    Json(String),
    /// Built-in defaults
    Default,
}

/// Configuration loader
#[derive(Default)]
pub struct ConfigLoader {
    source: Option<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create an empty loader; loading without a source yields defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Enable environment overrides under a prefix, e.g. `GATEWAY`
    /// honors `GATEWAY_SERVER_PORT` and `GATEWAY_LOG_LEVEL`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load, apply overrides and validate
    ///
    /// # Errors
    /// Returns `ConfigError` when reading, parsing or validation fails.
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.source {
            Some(source) => Self::load_source(source).await?,
            None => GatewayConfig::default(),
        };

        if let Some(prefix) = &self.env_prefix {
            apply_env_overrides(&mut config, prefix);
        }

        config
            .validate_config()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        info!(routes = config.routes.len(), "Configuration loaded");
        Ok(config)
    }

    async fn load_source(source: &ConfigSource) -> Result<GatewayConfig, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Yaml(content) => {
                Ok(serde_yaml::from_str(&substitute_env_vars(content))?)
            }
            ConfigSource::Toml(content) => Ok(toml::from_str(&substitute_env_vars(content))?),
            ConfigSource::Json(content) => {
                Ok(serde_json::from_str(&substitute_env_vars(content))?)
            }
            ConfigSource::Default => Ok(GatewayConfig::default()),
        }
    }

    async fn load_file(path: &str) -> Result<GatewayConfig, ConfigError> {
        let path = Path::new(path);
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = fs::read_to_string(path).await?;
        let content = substitute_env_vars(&content);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        debug!(path = %path.display(), format = %extension, "Loading configuration file");

        match extension.as_str() {
            "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
            "toml" => Ok(toml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }
}

/// Substitute `${VAR}` and `${VAR:-default}` references.
///
/// Unset variables without a default are left in place with a warning so
/// the parse error points at the real problem.
fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let Some(full) = cap.get(0) else { continue };
        let Some(spec) = cap.get(1) else { continue };
        let spec = spec.as_str();

        let (name, default) = match spec.find(":-") {
            Some(idx) => (&spec[..idx], Some(&spec[idx + 2..])),
            None => (spec, None),
        };

        match std::env::var(name) {
            Ok(value) => result = result.replace(full.as_str(), &value),
            Err(_) => match default {
                Some(value) => result = result.replace(full.as_str(), value),
                None => warn!(var = %name, "Environment variable not set"),
            },
        }
    }
    result
}

fn apply_env_overrides(config: &mut GatewayConfig, prefix: &str) {
    if let Ok(host) = std::env::var(format!("{prefix}_SERVER_HOST")) {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var(format!("{prefix}_SERVER_PORT")) {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }
    if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
        config.logging.level = level;
    }
    if let Ok(enabled) = std::env::var(format!("{prefix}_CACHE_ENABLED")) {
        config.cache.enabled = enabled.parse().unwrap_or(true);
    }
}

/// Load configuration from the conventional locations.
///
/// Tries, in order: the `CONFIG_PATH` environment variable, `config.yaml`,
/// `config.yml`, `config/default.yaml`, `/etc/api-gateway/config.yaml`.
/// Falls back to defaults when nothing is found.
///
/// # Errors
/// Returns `ConfigError` when a found file fails to load or validate.
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let explicit = std::env::var("CONFIG_PATH").ok();
    let candidates = match &explicit {
        Some(path) => vec![path.as_str()],
        None => vec![
            "config.yaml",
            "config.yml",
            "config/default.yaml",
            "/etc/api-gateway/config.yaml",
        ],
    };

    for path in candidates {
        if Path::new(path).exists() {
            info!(path = %path, "Loading configuration");
            return ConfigLoader::new()
                .with_file(path)
                .with_env_prefix("GATEWAY")
                .load()
                .await;
        }
    }

    warn!("No configuration file found, using defaults");
    Ok(GatewayConfig::default())
}

//! Loading configuration from disk

use crate::config::ShelfmarkConfig;
use crate::credentials::resolve_api_key;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested file does not exist
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// No API key in the environment or config
    #[error("{provider} API key not configured (set {env_var} or api_key in config)")]
    MissingApiKey {
        /// Provider name
        provider: String,
        /// Environment variable that was checked
        env_var: String,
    },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// `$XDG_CONFIG_HOME/shelfmark/config.toml` or platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shelfmark").join("config.toml"))
}

impl ShelfmarkConfig {
    /// Parse configuration from a TOML string and validate it
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let config = Self::from_toml_str(&source)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `explicit` if given, else the default path if it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mapping.top_k == 0 {
            return Err(ConfigError::Invalid("mapping.top_k must be at least 1".into()));
        }
        if self.batch.enabled && self.batch.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "batch.poll_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// API key for the completion provider
    pub fn provider_api_key(&self) -> ConfigResult<String> {
        let env_var = self.provider.kind.api_key_env();
        resolve_api_key(env_var, self.provider.api_key.as_deref())
            .map(|(key, _)| key)
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: self.provider.kind.as_str().to_string(),
                env_var: env_var.to_string(),
            })
    }

    /// API key for the embedding provider
    pub fn embedding_api_key(&self) -> ConfigResult<String> {
        resolve_api_key("OPENAI_API_KEY", self.embedding.api_key.as_deref())
            .map(|(key, _)| key)
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: "openai".to_string(),
                env_var: "OPENAI_API_KEY".to_string(),
            })
    }
}

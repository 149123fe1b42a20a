//! Glue Configuration
//!
//! Handles parsing of neuroshare.toml configuration files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::ffi::{
    ApiVersion, Registry, SearchStrategy, VersionPolicy, DEFAULT_CAPACITY, MAX_CAPACITY,
};

/// File name searched for by [`GlueConfig::find_and_load`]
pub const CONFIG_FILE: &str = "neuroshare.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration structure matching neuroshare.toml.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlueConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub version: VersionConfig,
}

impl GlueConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: GlueConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration from the current directory or parents.
    pub fn load_from_cwd() -> ConfigResult<Self> {
        let cwd = std::env::current_dir().map_err(ConfigError::Io)?;
        Self::find_and_load(&cwd)
    }

    /// Find and load configuration by searching up from the given directory.
    pub fn find_and_load(start_dir: &Path) -> ConfigResult<Self> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Self::load(&config_path);
            }
            if !dir.pop() {
                return Ok(Self::default());
            }
        }
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(1..=MAX_CAPACITY).contains(&self.registry.capacity) {
            return Err(ConfigError::Invalid {
                key: "registry.capacity",
                reason: format!(
                    "{} is outside 1..={}",
                    self.registry.capacity, MAX_CAPACITY
                ),
            });
        }
        if let Some(suffix) = &self.loader.suffix {
            if suffix.is_empty() || suffix.contains('\0') {
                return Err(ConfigError::Invalid {
                    key: "loader.suffix",
                    reason: format!("unusable suffix {:?}", suffix),
                });
            }
        }
        self.version_policy().map(|_| ())
    }

    pub fn version_policy(&self) -> ConfigResult<VersionPolicy> {
        if !self.version.check {
            return Ok(VersionPolicy::Disabled);
        }
        let parse = |key: &'static str, value: &str| {
            value
                .parse::<ApiVersion>()
                .map_err(|reason| ConfigError::Invalid { key, reason })
        };
        let min = parse("version.min", &self.version.min)?;
        let max = parse("version.max", &self.version.max)?;
        if min > max {
            return Err(ConfigError::Invalid {
                key: "version",
                reason: format!("min {} is above max {}", min, max),
            });
        }
        Ok(VersionPolicy::Range { min, max })
    }

    /// Registry with the system loader, configured from this file.
    pub fn build_registry(&self) -> ConfigResult<Registry> {
        self.validate()?;
        let mut builder = Registry::builder()
            .capacity(self.registry.capacity)
            .search(self.loader.search)
            .version_policy(self.version_policy()?);
        if let Some(suffix) = &self.loader.suffix {
            builder = builder.suffix(suffix.clone());
        }
        Ok(builder.build())
    }
}

/// Library table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Number of slots
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Module lookup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub search: SearchStrategy,

    /// Overrides the platform shared-library suffix
    #[serde(default)]
    pub suffix: Option<String>,
}

/// API version gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    /// Reject libraries outside `min..=max`
    #[serde(default)]
    pub check: bool,

    #[serde(default = "default_version")]
    pub min: String,

    #[serde(default = "default_version")]
    pub max: String,
}

fn default_version() -> String {
    "1.3".to_string()
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            check: false,
            min: default_version(),
            max: default_version(),
        }
    }
}

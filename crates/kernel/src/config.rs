use serde::{Deserialize, Serialize};
use std::path::Path;

/// Planar radius within which players are shown newly placed objects.
pub const DEFAULT_BROADCAST_DISTANCE: i32 = 60;

/// Errors from loading or validating registry configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the object registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Planar radius (in tiles, per axis) used by `register` and
    /// `load_new_region` to decide who is shown an object.
    pub broadcast_distance: i32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_distance: DEFAULT_BROADCAST_DISTANCE,
        }
    }
}

impl RegistryConfig {
    /// Parse and validate a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded registry config");
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_distance < 0 {
            return Err(ConfigError::Invalid(format!(
                "broadcast_distance must be non-negative, got {}",
                self.broadcast_distance
            )));
        }
        Ok(())
    }
}

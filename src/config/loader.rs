use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::types::RuntimeConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

impl RuntimeConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/sdui-runtime/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("sdui-runtime").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `RuntimeConfig::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(RuntimeConfig::default());
        }

        Self::load_from(&path)
    }

    /// Loads, parses and validates the file at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: RuntimeConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Every validation limit is positive
    /// - The change buffer can hold at least one change
    /// - Remote replays are allowed at least one level
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        let named = [
            ("limits.max_actions", limits.max_actions),
            ("limits.max_triggers", limits.max_triggers),
            ("limits.max_children_per_node", limits.max_children_per_node),
            ("limits.max_depth", limits.max_depth),
            ("limits.max_template_length", limits.max_template_length),
            ("limits.max_nodes", limits.max_nodes),
            ("store.change_buffer", self.store.change_buffer),
        ];

        if let Some((name, _)) = named.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Validation {
                message: format!("'{}' must be greater than zero", name),
            });
        }

        if self.actions.max_replay_depth == 0 {
            return Err(ConfigError::Validation {
                message: "'actions.max_replay_depth' must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

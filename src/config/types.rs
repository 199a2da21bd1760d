use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_MAX_REPLAY_DEPTH;
use crate::screen::ValidationLimits;

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub limits: ValidationLimits,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which cache tier a screen goes through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicyKind {
    Disabled,
    #[default]
    Memory,
    Disk,
}

/// Screen cache settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub default_policy: CachePolicyKind,
    /// TTL applied when neither the policy nor an override sets one.
    /// `None` keeps entries until removed.
    #[serde(default)]
    pub default_ttl_seconds: Option<u64>,
    /// Disk cache directory (default: `<cache dir>/sdui-runtime/screens`).
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Per-screen-id overrides.
    #[serde(default)]
    pub screens: HashMap<String, ScreenCacheOverride>,
}

impl CacheConfig {
    /// Directory used by the disk cache.
    pub fn directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sdui-runtime")
                .join("screens")
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenCacheOverride {
    #[serde(default)]
    pub policy: Option<CachePolicyKind>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// Variable store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Capacity of the change notification channel (default: 256).
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,
    /// Enables JSON-file persistence for `Persistent` variables.
    #[serde(default)]
    pub persistence_directory: Option<PathBuf>,
}

/// Action dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsConfig {
    /// Maximum nesting of remote action replays (default: 8).
    #[serde(default = "default_max_replay_depth")]
    pub max_replay_depth: u32,
}

/// Tracing output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_change_buffer() -> usize {
    256
}

fn default_max_replay_depth() -> u32 {
    DEFAULT_MAX_REPLAY_DEPTH
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            change_buffer: default_change_buffer(),
            persistence_directory: None,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            max_replay_depth: default_max_replay_depth(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

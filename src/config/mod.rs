//! Runtime configuration.
//!
//! Loaded once at startup and passed down explicitly; nothing here is global.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{
    ActionsConfig, CacheConfig, CachePolicyKind, LoggingConfig, RuntimeConfig,
    ScreenCacheOverride, StoreConfig,
};

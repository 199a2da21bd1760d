use std::time::Duration;

use crate::config::{CacheConfig, CachePolicyKind};
use crate::screen::ScreenRequest;

/// How one request is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always fetch, never store.
    Disabled,
    /// Memory tier only.
    Memory { ttl: Option<Duration> },
    /// Memory tier backed by the disk cache.
    Disk { ttl: Option<Duration> },
}

impl CachePolicy {
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Memory { ttl } | Self::Disk { ttl } => *ttl,
        }
    }
}

/// Chooses a [`CachePolicy`] per request.
pub trait CachePolicyResolver: Send + Sync {
    fn resolve(&self, request: &ScreenRequest) -> CachePolicy;
}

/// Resolver driven by [`CacheConfig`]: per-screen overrides first, then the
/// configured default.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredPolicyResolver {
    config: CacheConfig,
}

impl ConfiguredPolicyResolver {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }
}

impl CachePolicyResolver for ConfiguredPolicyResolver {
    fn resolve(&self, request: &ScreenRequest) -> CachePolicy {
        let screen = self.config.screens.get(&request.screen_id);
        let kind = screen
            .and_then(|o| o.policy)
            .unwrap_or(self.config.default_policy);
        let ttl = screen
            .and_then(|o| o.ttl_seconds)
            .or(self.config.default_ttl_seconds)
            .map(Duration::from_secs);

        match kind {
            CachePolicyKind::Disabled => CachePolicy::Disabled,
            CachePolicyKind::Memory => CachePolicy::Memory { ttl },
            CachePolicyKind::Disk => CachePolicy::Disk { ttl },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenCacheOverride;

    #[test]
    fn overrides_win_over_defaults() {
        let mut config = CacheConfig {
            default_policy: CachePolicyKind::Disk,
            default_ttl_seconds: Some(60),
            ..CacheConfig::default()
        };
        config.screens.insert(
            "checkout".to_string(),
            ScreenCacheOverride {
                policy: Some(CachePolicyKind::Disabled),
                ttl_seconds: None,
            },
        );
        config.screens.insert(
            "feed".to_string(),
            ScreenCacheOverride {
                policy: None,
                ttl_seconds: Some(5),
            },
        );
        let resolver = ConfiguredPolicyResolver::new(config);

        assert_eq!(
            resolver.resolve(&ScreenRequest::new("home")),
            CachePolicy::Disk {
                ttl: Some(Duration::from_secs(60))
            }
        );
        assert_eq!(
            resolver.resolve(&ScreenRequest::new("checkout")),
            CachePolicy::Disabled
        );
        assert_eq!(
            resolver.resolve(&ScreenRequest::new("feed").param("page", "2")),
            CachePolicy::Disk {
                ttl: Some(Duration::from_secs(5))
            }
        );
    }
}

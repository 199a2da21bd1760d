//! Screen hosting: load, validate, activate.
//!
//! ```text
//!   open(request)
//!     ├─ CachingScreenFetcher::load ── error ──→ ScreenView::Placeholder
//!     ├─ VariableStore::sync_from_persistent(screen)
//!     └─ TriggerEngine::start(screen.triggers) ──→ ScreenView::Active
//! ```
//!
//! The store and registry are shared by every screen a host opens; each
//! active screen owns its action context and trigger engine.

mod view;

use std::sync::Arc;

use crate::actions::{ActionContext, ActionFetcher, ActionRegistry, Navigator, NoopNavigator};
use crate::cache::{
    CachingScreenFetcher, ConfiguredPolicyResolver, DiskScreenCache, FileDiskStorage,
    ScreenFetcher,
};
use crate::config::{CachePolicyKind, RuntimeConfig};
use crate::error::RuntimeError;
use crate::screen::ScreenRequest;
use crate::triggers::TriggerEngine;
use crate::variables::{JsonFilePersistence, StoreError, VariableStore};

pub use view::{ActiveScreen, ErrorPlaceholder, ScreenView};

pub struct ScreenHostBuilder {
    screens: CachingScreenFetcher,
    store: Option<VariableStore>,
    registry: Option<Arc<ActionRegistry>>,
    navigator: Option<Arc<dyn Navigator>>,
    action_fetcher: Option<Arc<dyn ActionFetcher>>,
}

impl ScreenHostBuilder {
    pub fn store(mut self, store: VariableStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn action_fetcher(mut self, fetcher: Arc<dyn ActionFetcher>) -> Self {
        self.action_fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> ScreenHost {
        ScreenHost {
            screens: self.screens,
            store: self.store.unwrap_or_else(VariableStore::in_memory),
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ActionRegistry::with_defaults())),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
            action_fetcher: self.action_fetcher,
        }
    }
}

/// Opens screens and wires them to the shared runtime services.
pub struct ScreenHost {
    screens: CachingScreenFetcher,
    store: VariableStore,
    registry: Arc<ActionRegistry>,
    navigator: Arc<dyn Navigator>,
    action_fetcher: Option<Arc<dyn ActionFetcher>>,
}

impl ScreenHost {
    pub fn builder(screens: CachingScreenFetcher) -> ScreenHostBuilder {
        ScreenHostBuilder {
            screens,
            store: None,
            registry: None,
            navigator: None,
            action_fetcher: None,
        }
    }

    /// Assemble a host from configuration.
    ///
    /// Enables JSON-file persistence when `store.persistence_directory` is
    /// set, and the disk cache when any screen may use the `disk` policy.
    /// Must be called from within a Tokio runtime.
    pub fn from_config(
        config: &RuntimeConfig,
        fetcher: Arc<dyn ScreenFetcher>,
        navigator: Arc<dyn Navigator>,
    ) -> ScreenHost {
        let mut store = VariableStore::builder().change_buffer(config.store.change_buffer);
        if let Some(directory) = &config.store.persistence_directory {
            store = store.persistence(Arc::new(JsonFilePersistence::new(directory)));
        }

        let registry = ActionRegistry::builder()
            .max_replay_depth(config.actions.max_replay_depth)
            .build();

        let cache = &config.cache;
        let mut screens = CachingScreenFetcher::builder(fetcher)
            .limits(config.limits)
            .policy_resolver(Arc::new(ConfiguredPolicyResolver::new(cache.clone())));
        let uses_disk = cache.default_policy == CachePolicyKind::Disk
            || cache
                .screens
                .values()
                .any(|o| o.policy == Some(CachePolicyKind::Disk));
        if uses_disk {
            let storage = Arc::new(FileDiskStorage::new(cache.directory()));
            screens = screens.disk_cache(Arc::new(DiskScreenCache::new(storage)));
        }

        tracing::info!(
            persistent = config.store.persistence_directory.is_some(),
            disk_cache = uses_disk,
            "Screen host configured"
        );

        ScreenHost::builder(screens.build())
            .store(store.build())
            .registry(Arc::new(registry))
            .navigator(navigator)
            .build()
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn screens(&self) -> &CachingScreenFetcher {
        &self.screens
    }

    /// Load and activate a screen. Failures become a placeholder view.
    pub async fn open(&self, request: ScreenRequest) -> ScreenView {
        match self.activate(&request).await {
            Ok(active) => ScreenView::Active(active),
            Err(e) => {
                tracing::warn!(
                    screen_id = %request.screen_id,
                    error_type = e.error_type(),
                    error = %e,
                    "Screen could not be opened"
                );
                ScreenView::Placeholder(ErrorPlaceholder::from_error(&request.screen_id, &e))
            }
        }
    }

    async fn activate(&self, request: &ScreenRequest) -> Result<ActiveScreen, RuntimeError> {
        let screen = self.screens.load(request).await?;

        match self.store.sync_from_persistent(Some(&screen.id)).await {
            Ok(summary) => tracing::debug!(
                screen_id = %screen.id,
                applied = summary.applied,
                kept_local = summary.kept_local,
                "Variables synced"
            ),
            Err(StoreError::Disposed) => return Err(StoreError::Disposed.into()),
            // The screen still works from in-memory state.
            Err(e) => tracing::warn!(screen_id = %screen.id, error = %e, "Variable sync failed"),
        }

        let mut ctx = ActionContext::new(
            self.store.clone(),
            Arc::clone(&self.navigator),
            Arc::clone(&self.registry),
        )
        .with_screen(screen.id.clone());
        if let Some(fetcher) = &self.action_fetcher {
            ctx = ctx.with_fetcher(Arc::clone(fetcher));
        }

        let engine = TriggerEngine::new(ctx.clone());
        engine
            .start(screen.triggers.clone())
            .map_err(|e| RuntimeError::Unknown(e.into()))?;

        tracing::info!(
            screen_id = %screen.id,
            version = screen.version,
            triggers = screen.triggers.len(),
            "Screen opened"
        );
        Ok(ActiveScreen::new(screen, ctx, engine))
    }
}

impl std::fmt::Debug for ScreenHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenHost")
            .field("screens", &self.screens)
            .field("has_action_fetcher", &self.action_fetcher.is_some())
            .finish()
    }
}

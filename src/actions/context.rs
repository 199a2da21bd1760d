use std::sync::Arc;

use super::collaborators::{ActionFetcher, Navigator};
use super::error::ActionError;
use super::registry::ActionRegistry;
use crate::variables::{Scope, ScopeKind, VariableStore};

/// Ambient state handlers run with.
///
/// One context exists per active screen; nested remote replays derive a child
/// context with a deeper replay depth.
#[derive(Clone)]
pub struct ActionContext {
    screen_id: Option<String>,
    store: VariableStore,
    navigator: Arc<dyn Navigator>,
    fetcher: Option<Arc<dyn ActionFetcher>>,
    registry: Arc<ActionRegistry>,
    depth: u32,
}

impl ActionContext {
    pub fn new(
        store: VariableStore,
        navigator: Arc<dyn Navigator>,
        registry: Arc<ActionRegistry>,
    ) -> Self {
        Self {
            screen_id: None,
            store,
            navigator,
            fetcher: None,
            registry,
            depth: 0,
        }
    }

    pub fn with_screen(mut self, screen_id: impl Into<String>) -> Self {
        self.screen_id = Some(screen_id.into());
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ActionFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn screen_id(&self) -> Option<&str> {
        self.screen_id.as_deref()
    }

    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    pub fn fetcher(&self) -> Option<&Arc<dyn ActionFetcher>> {
        self.fetcher.as_ref()
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Current remote replay depth; zero outside of replays.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Resolve a declared scope against this context's screen.
    pub fn scope(&self, kind: ScopeKind, action_id: &str) -> Result<Scope, ActionError> {
        Scope::resolve(kind, self.screen_id()).ok_or_else(|| ActionError::MissingScreen {
            action_id: action_id.to_string(),
        })
    }

    /// Child context for replaying remote actions one level deeper.
    pub fn nested(&self) -> Result<Self, ActionError> {
        let limit = self.registry.max_replay_depth();
        if self.depth >= limit {
            return Err(ActionError::ReplayDepth { limit });
        }
        let mut child = self.clone();
        child.depth += 1;
        Ok(child)
    }
}

impl std::fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionContext")
            .field("screen_id", &self.screen_id)
            .field("depth", &self.depth)
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

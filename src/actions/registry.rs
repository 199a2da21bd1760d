//! Action dispatch table.
//!
//! The table maps an [`ActionKind`] to one handler. It is built once from the
//! default handler set merged with caller overrides (override wins), then
//! shared by every active screen.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::ActionContext;
use super::error::ActionError;
use super::handlers;
use super::types::{Action, ActionKind};

pub const DEFAULT_MAX_REPLAY_DEPTH: u32 = 8;

/// Handles one kind of action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The action kind this handler accepts.
    fn kind(&self) -> ActionKind;

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError>;
}

/// Why an action was dropped without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingHandler {
        kind: ActionKind,
    },
    HandlerTypeMismatch {
        registered: ActionKind,
        received: ActionKind,
    },
}

/// Result of a successful dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Logged and dropped; never fatal.
    Dropped(DropReason),
}

/// Handler built from an async closure over owned copies of the action and
/// context.
pub struct FnHandler<F> {
    kind: ActionKind,
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Action, ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    pub fn new(kind: ActionKind, func: F) -> Self {
        Self { kind, func }
    }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Action, ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
{
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        (self.func)(action.clone(), ctx.clone()).await
    }
}

/// Builder for [`ActionRegistry`].
pub struct ActionRegistryBuilder {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    max_replay_depth: u32,
}

impl ActionRegistryBuilder {
    /// Empty builder without default handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            max_replay_depth: DEFAULT_MAX_REPLAY_DEPTH,
        }
    }

    /// Builder preloaded with the default handler set.
    pub fn with_defaults() -> Self {
        let mut builder = Self::empty();
        for handler in handlers::default_handlers() {
            builder = builder.register(handler);
        }
        builder
    }

    /// Register a handler under the kind it declares. Replaces any existing
    /// handler for that kind.
    pub fn register(self, handler: Arc<dyn ActionHandler>) -> Self {
        let kind = handler.kind();
        self.register_as(kind, handler)
    }

    /// Register a handler under an explicit kind.
    ///
    /// A handler whose declared kind differs from `kind` stays registered, but
    /// dispatches to it are dropped with a type mismatch.
    pub fn register_as(mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) -> Self {
        if self.handlers.insert(kind, handler).is_some() {
            tracing::debug!(kind = %kind, "Overriding action handler");
        }
        self
    }

    /// Merge caller overrides; an override wins on collision.
    pub fn overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (ActionKind, Arc<dyn ActionHandler>)>,
    {
        for (kind, handler) in overrides {
            self = self.register_as(kind, handler);
        }
        self
    }

    pub fn max_replay_depth(mut self, depth: u32) -> Self {
        self.max_replay_depth = depth;
        self
    }

    pub fn build(self) -> ActionRegistry {
        ActionRegistry {
            handlers: self.handlers,
            max_replay_depth: self.max_replay_depth,
        }
    }
}

/// Polymorphic dispatch of actions to handlers.
pub struct ActionRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
    max_replay_depth: u32,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::with_defaults()
    }

    /// Registry holding exactly the default handler set.
    pub fn with_defaults() -> Self {
        ActionRegistryBuilder::with_defaults().build()
    }

    pub fn handles(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn max_replay_depth(&self) -> u32 {
        self.max_replay_depth
    }

    /// Dispatch one action.
    ///
    /// A missing handler or a handler registered for another kind is logged
    /// and reported as [`DispatchOutcome::Dropped`]. Only failures raised by
    /// the handler itself come back as errors.
    pub async fn dispatch(
        &self,
        action: &Action,
        ctx: &ActionContext,
    ) -> Result<DispatchOutcome, ActionError> {
        let kind = action.kind();

        let Some(handler) = self.handlers.get(&kind) else {
            tracing::warn!(
                action_id = %action.id,
                kind = %kind,
                "No handler registered, dropping action"
            );
            return Ok(DispatchOutcome::Dropped(DropReason::MissingHandler { kind }));
        };

        let registered = handler.kind();
        if registered != kind {
            tracing::warn!(
                action_id = %action.id,
                kind = %kind,
                handler_kind = %registered,
                "Handler does not accept this action type, dropping action"
            );
            return Ok(DispatchOutcome::Dropped(DropReason::HandlerTypeMismatch {
                registered,
                received: kind,
            }));
        }

        tracing::debug!(
            action_id = %action.id,
            kind = %kind,
            screen_id = ?ctx.screen_id(),
            depth = ctx.depth(),
            "Dispatching action"
        );
        handler.handle(action, ctx).await?;
        Ok(DispatchOutcome::Handled)
    }

    /// Dispatch a list in declared order, one at a time.
    ///
    /// The first handler error aborts the rest of the list. Returns the number
    /// of actions that were handled.
    pub async fn dispatch_all(
        &self,
        actions: &[Action],
        ctx: &ActionContext,
    ) -> Result<usize, ActionError> {
        let mut handled = 0;
        for action in actions {
            if self.dispatch(action, ctx).await? == DispatchOutcome::Handled {
                handled += 1;
            }
        }
        Ok(handled)
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(ActionKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("kinds", &kinds)
            .field("max_replay_depth", &self.max_replay_depth)
            .finish()
    }
}

//! What a host hands to the renderer after opening a screen.

use crate::actions::{Action, ActionContext, ActionError, DispatchOutcome};
use crate::binding::BindingResolver;
use crate::error::RuntimeError;
use crate::screen::Screen;
use crate::triggers::{EngineError, LifecycleEvent, TriggerEngine};
use crate::variables::VariableStore;

/// Result of [`ScreenHost::open`](super::ScreenHost::open).
#[derive(Debug)]
pub enum ScreenView {
    Active(ActiveScreen),
    Placeholder(ErrorPlaceholder),
}

impl ScreenView {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn into_active(self) -> Option<ActiveScreen> {
        match self {
            Self::Active(active) => Some(active),
            Self::Placeholder(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<&ErrorPlaceholder> {
        match self {
            Self::Placeholder(placeholder) => Some(placeholder),
            Self::Active(_) => None,
        }
    }
}

/// Rendered in place of a screen that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPlaceholder {
    pub screen_id: String,
    /// Machine-readable category, see [`RuntimeError::error_type`].
    pub error_type: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ErrorPlaceholder {
    pub fn from_error(screen_id: impl Into<String>, error: &RuntimeError) -> Self {
        Self {
            screen_id: screen_id.into(),
            error_type: error.error_type(),
            message: error.user_message(),
        }
    }
}

/// A validated screen with a running trigger engine.
///
/// Dropping it stops the engine without firing `Close` triggers.
#[derive(Debug)]
pub struct ActiveScreen {
    screen: Screen,
    ctx: ActionContext,
    engine: TriggerEngine,
}

impl ActiveScreen {
    pub(super) fn new(screen: Screen, ctx: ActionContext, engine: TriggerEngine) -> Self {
        Self {
            screen,
            ctx,
            engine,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn id(&self) -> &str {
        &self.screen.id
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn engine(&self) -> &TriggerEngine {
        &self.engine
    }

    /// Resolver for render passes over this screen's variables.
    pub fn resolver(&self) -> BindingResolver<VariableStore> {
        BindingResolver::new(self.ctx.store().clone(), Some(self.screen.id.clone()))
    }

    /// Dispatch a user-initiated action in this screen's context.
    pub async fn dispatch(&self, action: &Action) -> Result<DispatchOutcome, ActionError> {
        self.ctx.registry().dispatch(action, &self.ctx).await
    }

    /// Forward `Resume` / `Pause` from the platform.
    pub fn notify(&self, event: LifecycleEvent) -> Result<(), EngineError> {
        self.engine.notify_lifecycle(event)
    }

    /// Fire `Close` triggers, let running firings finish, then dispose.
    pub async fn close(self) {
        if let Err(e) = self.engine.notify_lifecycle(LifecycleEvent::Close) {
            tracing::debug!(screen_id = %self.screen.id, error = %e, "Close not delivered");
        }
        self.engine.drain_and_stop().await;
        self.release();
    }

    /// Stop the engine, aborting in-flight firings, and drop the screen's
    /// in-memory variables. `Close` triggers do not fire.
    pub async fn dispose(self) {
        self.engine.stop().await;
        self.release();
    }

    fn release(&self) {
        let cleared = self.ctx.store().clear_screen(&self.screen.id);
        tracing::info!(screen_id = %self.screen.id, cleared, "Screen disposed");
    }
}

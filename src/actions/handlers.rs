//! Default handler set.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::context::ActionContext;
use super::error::ActionError;
use super::registry::ActionHandler;
use super::types::{Action, ActionKind, ActionPayload, Destination};

/// Handlers registered when the caller supplies no override.
///
/// Submit and Custom have no default: hosts register their own.
pub fn default_handlers() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(ForwardHandler),
        Arc::new(PopupHandler),
        Arc::new(OverlayHandler),
        Arc::new(SetVariableHandler),
        Arc::new(IncrementHandler),
        Arc::new(RemoveVariableHandler),
        Arc::new(AnalyticsHandler),
        Arc::new(FetchActionsHandler),
    ]
}

fn unexpected(expected: ActionKind, action: &Action) -> ActionError {
    ActionError::UnexpectedPayload {
        expected,
        found: action.kind(),
    }
}

pub struct ForwardHandler;

#[async_trait]
impl ActionHandler for ForwardHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Forward
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::Forward { destination } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        match destination {
            Destination::Screen { screen_id, params } => {
                ctx.navigator().forward(screen_id, params).await?
            }
            Destination::Route { route } => ctx.navigator().open_route(route).await?,
        }
        Ok(())
    }
}

pub struct PopupHandler;

#[async_trait]
impl ActionHandler for PopupHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Popup
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::Popup { screen_id, params } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        ctx.navigator().show_popup(screen_id, params).await?;
        Ok(())
    }
}

pub struct OverlayHandler;

#[async_trait]
impl ActionHandler for OverlayHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Overlay
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::Overlay { screen_id, params } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        ctx.navigator().show_overlay(screen_id, params).await?;
        Ok(())
    }
}

pub struct SetVariableHandler;

#[async_trait]
impl ActionHandler for SetVariableHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::SetVariable
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::SetVariable {
            key,
            value,
            scope,
            policy,
            ttl_seconds,
        } = &action.payload
        else {
            return Err(unexpected(self.kind(), action));
        };
        let scope = ctx.scope(*scope, &action.id)?;
        ctx.store()
            .set(
                key,
                value.clone(),
                &scope,
                *policy,
                ttl_seconds.map(Duration::from_secs),
            )
            .await?;
        Ok(())
    }
}

pub struct IncrementHandler;

#[async_trait]
impl ActionHandler for IncrementHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Increment
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::Increment {
            key,
            delta,
            scope,
            policy,
        } = &action.payload
        else {
            return Err(unexpected(self.kind(), action));
        };
        let scope = ctx.scope(*scope, &action.id)?;
        ctx.store().increment(key, *delta, &scope, *policy).await?;
        Ok(())
    }
}

pub struct RemoveVariableHandler;

#[async_trait]
impl ActionHandler for RemoveVariableHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::RemoveVariable
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::RemoveVariable { key, scope } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        let scope = ctx.scope(*scope, &action.id)?;
        ctx.store().remove(key, &scope).await?;
        Ok(())
    }
}

/// Emits analytics events as tracing events on a dedicated target.
pub struct AnalyticsHandler;

#[async_trait]
impl ActionHandler for AnalyticsHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::Analytics
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::Analytics { event, properties } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        tracing::info!(
            target: "sdui_runtime::analytics",
            event = %event,
            screen_id = ?ctx.screen_id(),
            ?properties,
            "Analytics event"
        );
        Ok(())
    }
}

/// Fetches follow-up actions and replays them through the registry in order.
pub struct FetchActionsHandler;

#[async_trait]
impl ActionHandler for FetchActionsHandler {
    fn kind(&self) -> ActionKind {
        ActionKind::FetchActions
    }

    async fn handle(&self, action: &Action, ctx: &ActionContext) -> Result<(), ActionError> {
        let ActionPayload::FetchActions { path, params } = &action.payload else {
            return Err(unexpected(self.kind(), action));
        };
        let fetcher = ctx.fetcher().ok_or_else(|| ActionError::NoFetcher {
            action_id: action.id.clone(),
        })?;
        let nested = ctx.nested()?;

        let actions = fetcher.fetch(path, params).await?;
        tracing::debug!(
            action_id = %action.id,
            path = %path,
            count = actions.len(),
            depth = nested.depth(),
            "Replaying remote actions"
        );
        ctx.registry().dispatch_all(&actions, &nested).await?;
        Ok(())
    }
}

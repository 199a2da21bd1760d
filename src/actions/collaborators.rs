//! Collaborators consumed by the default handlers.

use async_trait::async_trait;

use super::error::NavigationError;
use super::types::{Action, Params};
use crate::error::FetchError;

/// Host navigation surface.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn open_route(&self, route: &str) -> Result<(), NavigationError>;

    async fn forward(&self, screen_id: &str, params: &Params) -> Result<(), NavigationError>;

    async fn show_popup(&self, screen_id: &str, params: &Params) -> Result<(), NavigationError>;

    async fn show_overlay(&self, screen_id: &str, params: &Params)
        -> Result<(), NavigationError>;
}

/// Retrieves follow-up actions from a remote endpoint.
#[async_trait]
pub trait ActionFetcher: Send + Sync {
    async fn fetch(&self, path: &str, params: &Params) -> Result<Vec<Action>, FetchError>;
}

/// Navigator that ignores every request, for hosts without navigation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

#[async_trait]
impl Navigator for NoopNavigator {
    async fn open_route(&self, route: &str) -> Result<(), NavigationError> {
        tracing::debug!(route, "Ignoring route navigation");
        Ok(())
    }

    async fn forward(&self, screen_id: &str, _params: &Params) -> Result<(), NavigationError> {
        tracing::debug!(screen_id, "Ignoring forward navigation");
        Ok(())
    }

    async fn show_popup(&self, screen_id: &str, _params: &Params) -> Result<(), NavigationError> {
        tracing::debug!(screen_id, "Ignoring popup");
        Ok(())
    }

    async fn show_overlay(
        &self,
        screen_id: &str,
        _params: &Params,
    ) -> Result<(), NavigationError> {
        tracing::debug!(screen_id, "Ignoring overlay");
        Ok(())
    }
}

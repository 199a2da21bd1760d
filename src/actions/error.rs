//! Error types for action handling.

use thiserror::Error;

use super::types::ActionKind;
use crate::error::FetchError;
use crate::variables::StoreError;

/// Failure reported by a navigator collaborator.
#[derive(Debug, Error)]
#[error("Navigation failed: {message}")]
pub struct NavigationError {
    pub message: String,
}

impl NavigationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while handling an action.
///
/// A handler error aborts the remaining actions of the list being dispatched.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Variable store error: {0}")]
    Store(#[from] StoreError),

    /// A screen-scoped variable action ran without an active screen.
    #[error("Action '{action_id}' targets the screen scope but no screen is active")]
    MissingScreen { action_id: String },

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("Remote actions failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Action '{action_id}' needs an action fetcher but none is configured")]
    NoFetcher { action_id: String },

    #[error("Remote action replay exceeded depth limit of {limit}")]
    ReplayDepth { limit: u32 },

    /// A handler received a payload it does not understand.
    #[error("Handler for {expected} received a {found} action")]
    UnexpectedPayload {
        expected: ActionKind,
        found: ActionKind,
    },

    /// Failure raised by a caller-supplied handler.
    #[error("Handler failed: {0}")]
    Handler(#[from] anyhow::Error),
}

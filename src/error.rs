//! Runtime-wide error taxonomy.

use thiserror::Error;

use crate::actions::{ActionError, ActionKind, DropReason};
use crate::cache::CacheError;
use crate::screen::ValidationIssue;
use crate::variables::StoreError;

/// Failure reported by a remote collaborator (screen or action fetcher).
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport or upstream failure.
    #[error("Remote request failed: {message}")]
    Remote { message: String },

    /// The upstream answered but the payload could not be mapped.
    #[error("Failed to map remote payload: {message}")]
    Mapping { message: String },
}

impl FetchError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }
}

/// Top-level error surfaced by the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Structural limits were violated. Carries every issue found.
    #[error("Screen failed validation with {} issue(s)", .0.len())]
    Validation(Vec<ValidationIssue>),

    #[error("Failed to map remote payload: {0}")]
    Mapping(String),

    #[error("Remote request failed: {0}")]
    Remote(String),

    /// An operation hit a value of the wrong type.
    #[error("{0}")]
    TypeMismatch(String),

    #[error("No handler registered for {kind} actions")]
    MissingHandler { kind: ActionKind },

    #[error("Handler registered for {registered} cannot take a {received} action")]
    HandlerTypeMismatch {
        registered: ActionKind,
        received: ActionKind,
    },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl RuntimeError {
    /// Short machine-readable category, useful for logs and placeholders.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Mapping(_) => "mapping",
            Self::Remote(_) => "remote",
            Self::TypeMismatch(_) => "type_mismatch",
            Self::MissingHandler { .. } => "missing_handler",
            Self::HandlerTypeMismatch { .. } => "handler_type_mismatch",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Message suitable for an error placeholder shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(issues) => {
                let mut message = String::from("This screen could not be displayed");
                if let Some(first) = issues.first() {
                    message.push_str(": ");
                    message.push_str(&first.message);
                    if issues.len() > 1 {
                        message.push_str(&format!(" (and {} more)", issues.len() - 1));
                    }
                }
                message
            }
            Self::Remote(_) => "This screen could not be loaded. Please try again.".to_string(),
            other => format!("Something went wrong: {}", other),
        }
    }
}

impl From<FetchError> for RuntimeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Remote { message } => Self::Remote(message),
            FetchError::Mapping { message } => Self::Mapping(message),
        }
    }
}

impl From<StoreError> for RuntimeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TypeMismatch { .. } => Self::TypeMismatch(err.to_string()),
            other => Self::Unknown(other.into()),
        }
    }
}

impl From<DropReason> for RuntimeError {
    fn from(reason: DropReason) -> Self {
        match reason {
            DropReason::MissingHandler { kind } => Self::MissingHandler { kind },
            DropReason::HandlerTypeMismatch {
                registered,
                received,
            } => Self::HandlerTypeMismatch {
                registered,
                received,
            },
        }
    }
}

impl From<ActionError> for RuntimeError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Store(store) => store.into(),
            ActionError::Fetch(fetch) => fetch.into(),
            other => Self::Unknown(other.into()),
        }
    }
}

impl From<CacheError> for RuntimeError {
    fn from(err: CacheError) -> Self {
        Self::Unknown(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::IssueCode;
    use crate::variables::VariableKey;

    #[test]
    fn store_type_mismatch_maps_to_type_mismatch() {
        let err: RuntimeError = StoreError::TypeMismatch {
            key: VariableKey::global("flag"),
            expected: "number",
            found: "bool",
        }
        .into();
        assert_eq!(err.error_type(), "type_mismatch");
    }

    #[test]
    fn fetch_errors_keep_their_category() {
        let remote: RuntimeError = FetchError::remote("timeout").into();
        let mapping: RuntimeError = FetchError::mapping("bad json").into();
        assert_eq!(remote.error_type(), "remote");
        assert_eq!(mapping.error_type(), "mapping");
    }

    #[test]
    fn validation_message_mentions_first_issue() {
        let err = RuntimeError::Validation(vec![
            ValidationIssue::new(IssueCode::BlankScreenId, "id", "Screen id is blank"),
            ValidationIssue::new(IssueCode::NegativeVersion, "version", "Version is negative"),
        ]);
        assert_eq!(
            err.user_message(),
            "This screen could not be displayed: Screen id is blank (and 1 more)"
        );
    }
}

//! Error types for the variable store and its persistence backends.

use std::path::PathBuf;

use thiserror::Error;

use super::scope::VariableKey;

/// Errors surfaced by [`VariableStore`](super::VariableStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was disposed; no further operations are accepted.
    #[error("Variable store has been disposed")]
    Disposed,

    /// The existing value cannot take part in the requested operation.
    #[error("Type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: VariableKey,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode variables: {0}")]
    Encode(#[source] serde_json::Error),

    /// The persistence writer stopped before answering.
    #[error("Persistence queue closed")]
    QueueClosed,
}

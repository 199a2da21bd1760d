//! Conflict resolution between in-memory and persisted variables.

use super::variable::Variable;

/// Outcome of comparing a local entry with its persisted counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    TakePersisted,
}

/// Strategy applied by `sync_from_persistent` when both sides hold a value.
pub trait ConflictStrategy: Send + Sync {
    fn resolve(&self, local: &Variable, persisted: &Variable) -> Resolution;
}

/// Newest `updated_at` wins; ties keep the in-memory value.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWriteWins;

impl ConflictStrategy for LastWriteWins {
    fn resolve(&self, local: &Variable, persisted: &Variable) -> Resolution {
        if persisted.updated_at > local.updated_at {
            Resolution::TakePersisted
        } else {
            Resolution::KeepLocal
        }
    }
}

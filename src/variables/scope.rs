use std::fmt;

use serde::{Deserialize, Serialize};

/// Scope as declared by screen payloads, before the screen id is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    #[default]
    Global,
    Screen,
}

/// Partition of the variable namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "screen_id", rename_all = "lowercase")]
pub enum Scope {
    Global,
    Screen(String),
}

impl Scope {
    pub fn screen(screen_id: impl Into<String>) -> Self {
        Self::Screen(screen_id.into())
    }

    /// Resolve a declared scope against the active screen.
    ///
    /// Returns `None` for `ScopeKind::Screen` when no screen is active.
    pub fn resolve(kind: ScopeKind, screen_id: Option<&str>) -> Option<Self> {
        match kind {
            ScopeKind::Global => Some(Self::Global),
            ScopeKind::Screen => screen_id.map(Self::screen),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Global => ScopeKind::Global,
            Self::Screen(_) => ScopeKind::Screen,
        }
    }

    pub fn screen_id(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Screen(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Screen(id) => write!(f, "screen:{}", id),
        }
    }
}

/// Unique identity of a variable: key plus scope (and screen id when scoped).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableKey {
    pub key: String,
    pub scope: Scope,
}

impl VariableKey {
    pub fn new(key: impl Into<String>, scope: Scope) -> Self {
        Self {
            key: key.into(),
            scope,
        }
    }

    pub fn global(key: impl Into<String>) -> Self {
        Self::new(key, Scope::Global)
    }
}

impl fmt::Display for VariableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.key)
    }
}

/// Whether a variable is mirrored to the persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    #[default]
    InMemory,
    Persistent,
}

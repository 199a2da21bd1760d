use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::variables::{Scope, ScopeKind, VariableKey};

/// Screen lifecycle events a trigger can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Open,
    Resume,
    Pause,
    Close,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// What a trigger listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum TriggerSource {
    VariableChanged {
        key: String,
        #[serde(default)]
        scope: ScopeKind,
    },
    Lifecycle {
        event: LifecycleEvent,
    },
}

/// Declarative rule binding an event to an ordered list of actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub source: TriggerSource,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Trigger {
    pub fn on_variable(
        id: impl Into<String>,
        key: impl Into<String>,
        scope: ScopeKind,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id: id.into(),
            source: TriggerSource::VariableChanged {
                key: key.into(),
                scope,
            },
            actions,
        }
    }

    pub fn on_lifecycle(id: impl Into<String>, event: LifecycleEvent, actions: Vec<Action>) -> Self {
        Self {
            id: id.into(),
            source: TriggerSource::Lifecycle { event },
            actions,
        }
    }

    /// Whether a change to `changed` fires this trigger on the given screen.
    pub fn matches_variable(&self, changed: &VariableKey, screen_id: Option<&str>) -> bool {
        let TriggerSource::VariableChanged { key, scope } = &self.source else {
            return false;
        };
        key == &changed.key
            && Scope::resolve(*scope, screen_id).is_some_and(|scope| scope == changed.scope)
    }

    pub fn matches_lifecycle(&self, event: LifecycleEvent) -> bool {
        matches!(&self.source, TriggerSource::Lifecycle { event: e } if *e == event)
    }
}

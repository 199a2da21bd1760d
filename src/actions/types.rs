//! Action payloads produced by screen descriptions.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variables::{ScopeKind, StoragePolicy, VariableValue};

/// Query-style parameters attached to navigation and remote requests.
pub type Params = BTreeMap<String, String>;

/// Discriminant of an action, used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Forward,
    Popup,
    Overlay,
    SetVariable,
    Increment,
    RemoveVariable,
    Submit,
    Analytics,
    Custom,
    FetchActions,
    /// A type this runtime does not know about.
    Unknown,
}

impl ActionKind {
    /// Wire tag of the kind. Once published, do not rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Popup => "popup",
            Self::Overlay => "overlay",
            Self::SetVariable => "set_variable",
            Self::Increment => "increment",
            Self::RemoveVariable => "remove_variable",
            Self::Submit => "submit",
            Self::Analytics => "analytics",
            Self::Custom => "custom",
            Self::FetchActions => "fetch_actions",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire tag. Unknown tags return `None` (forward compat).
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "forward" => Some(Self::Forward),
            "popup" => Some(Self::Popup),
            "overlay" => Some(Self::Overlay),
            "set_variable" => Some(Self::SetVariable),
            "increment" => Some(Self::Increment),
            "remove_variable" => Some(Self::RemoveVariable),
            "submit" => Some(Self::Submit),
            "analytics" => Some(Self::Analytics),
            "custom" => Some(Self::Custom),
            "fetch_actions" => Some(Self::FetchActions),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a forward navigation goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Screen {
        screen_id: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: Params,
    },
    Route {
        route: String,
    },
}

/// Variant-specific fields of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Forward {
        destination: Destination,
    },
    Popup {
        screen_id: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: Params,
    },
    Overlay {
        screen_id: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: Params,
    },
    SetVariable {
        key: String,
        value: VariableValue,
        #[serde(default)]
        scope: ScopeKind,
        #[serde(default)]
        policy: StoragePolicy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_seconds: Option<u64>,
    },
    Increment {
        key: String,
        #[serde(default = "default_delta")]
        delta: f64,
        #[serde(default)]
        scope: ScopeKind,
        #[serde(default)]
        policy: StoragePolicy,
    },
    RemoveVariable {
        key: String,
        #[serde(default)]
        scope: ScopeKind,
    },
    Submit {
        path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<String>,
    },
    Analytics {
        event: String,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, VariableValue>,
    },
    Custom {
        name: String,
        #[serde(default)]
        payload: Value,
    },
    FetchActions {
        path: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: Params,
    },
    /// Kept verbatim so it survives a cache round-trip.
    #[serde(skip)]
    Unknown { kind: String, raw: Value },
}

fn default_delta() -> f64 {
    1.0
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Forward { .. } => ActionKind::Forward,
            Self::Popup { .. } => ActionKind::Popup,
            Self::Overlay { .. } => ActionKind::Overlay,
            Self::SetVariable { .. } => ActionKind::SetVariable,
            Self::Increment { .. } => ActionKind::Increment,
            Self::RemoveVariable { .. } => ActionKind::RemoveVariable,
            Self::Submit { .. } => ActionKind::Submit,
            Self::Analytics { .. } => ActionKind::Analytics,
            Self::Custom { .. } => ActionKind::Custom,
            Self::FetchActions { .. } => ActionKind::FetchActions,
            Self::Unknown { .. } => ActionKind::Unknown,
        }
    }
}

/// Immutable instruction dispatched through the action registry.
///
/// On the wire an action is a flat object: `{"id": .., "type": .., ...fields}`.
/// Unrecognized `type` tags deserialize to [`ActionPayload::Unknown`] instead of
/// failing, so older runtimes keep working with newer payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    pub payload: ActionPayload,
}

impl Action {
    pub fn new(id: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = match &self.payload {
            ActionPayload::Unknown { raw, .. } => raw.clone(),
            payload => serde_json::to_value(payload).map_err(ser::Error::custom)?,
        };
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| de::Error::missing_field("type"))?;

        if ActionKind::parse(tag).is_none() {
            return Ok(Self {
                id,
                payload: ActionPayload::Unknown {
                    kind: tag.to_string(),
                    raw: value.clone(),
                },
            });
        }

        let payload = ActionPayload::deserialize(value).map_err(de::Error::custom)?;
        Ok(Self { id, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_actions() {
        let action: Action = serde_json::from_value(json!({
            "id": "a1",
            "type": "increment",
            "key": "count",
            "scope": "screen"
        }))
        .unwrap();

        assert_eq!(action.id, "a1");
        assert_eq!(
            action.payload,
            ActionPayload::Increment {
                key: "count".to_string(),
                delta: 1.0,
                scope: ScopeKind::Screen,
                policy: StoragePolicy::InMemory,
            }
        );
    }

    #[test]
    fn unknown_types_are_preserved() {
        let raw = json!({"id": "x", "type": "teleport", "target": "moon"});
        let action: Action = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(action.kind(), ActionKind::Unknown);
        assert_eq!(serde_json::to_value(&action).unwrap(), raw);
    }

    #[test]
    fn malformed_known_action_is_an_error() {
        let result: Result<Action, _> =
            serde_json::from_value(json!({"id": "x", "type": "set_variable"}));
        assert!(result.is_err());
    }

    #[test]
    fn missing_type_is_an_error() {
        let result: Result<Action, _> = serde_json::from_value(json!({"id": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_flat_shape() {
        let action = Action::new(
            "nav",
            ActionPayload::Forward {
                destination: Destination::Route {
                    route: "/settings".to_string(),
                },
            },
        );
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({
                "id": "nav",
                "type": "forward",
                "destination": {"kind": "route", "route": "/settings"}
            })
        );
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            ActionKind::Forward,
            ActionKind::Popup,
            ActionKind::Overlay,
            ActionKind::SetVariable,
            ActionKind::Increment,
            ActionKind::RemoveVariable,
            ActionKind::Submit,
            ActionKind::Analytics,
            ActionKind::Custom,
            ActionKind::FetchActions,
        ] {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::parse("unknown"), None);
    }
}

use serde::{Deserialize, Serialize};

use crate::variables::VariableValue;

/// Visibility/enablement rule evaluated against variable state on each render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    /// Compare against this value instead of using truthiness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<VariableValue>,
    /// Require the key to resolve. An unresolved key yields `!exists`.
    #[serde(default = "default_exists")]
    pub exists: bool,
    #[serde(default)]
    pub negate: bool,
}

fn default_exists() -> bool {
    true
}

impl Condition {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            equals: None,
            exists: true,
            negate: false,
        }
    }

    pub fn equals(mut self, value: impl Into<VariableValue>) -> Self {
        self.equals = Some(value.into());
        self
    }

    pub fn exists(mut self, exists: bool) -> Self {
        self.exists = exists;
        self
    }

    pub fn negate(mut self) -> Self {
        self.negate = !self.negate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let condition: Condition = serde_json::from_str(r#"{"key": "flag"}"#).unwrap();
        assert_eq!(condition, Condition::new("flag"));
        assert!(condition.exists);
        assert!(!condition.negate);
    }
}

//! Structural view of a screen payload.
//!
//! Only the fields the runtime reasons about are modeled; component-specific
//! properties ride along untouched in `props`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, Params};
use crate::binding::Condition;
use crate::triggers::Trigger;

/// A layout node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub component: String,
    /// Text binding template with `@{ key }` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Variable key bound directly when no template is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Condition>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub props: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            template: None,
            text_key: None,
            visible: None,
            enabled: None,
            props: Value::Null,
            children: Vec::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }
}

/// Fixed regions around the scrollable content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaffold {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub contents: Vec<Node>,
}

/// Screen description delivered by the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub scaffold: Scaffold,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<Trigger>,
}

impl Screen {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            scaffold: Scaffold::default(),
            sections: Vec::new(),
            root: None,
            actions: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn with_root(mut self, root: Node) -> Self {
        self.root = Some(root);
        self
    }
}

/// Identity of a screen request: what to fetch and with which parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenRequest {
    pub screen_id: String,
    pub params: Params,
}

impl ScreenRequest {
    pub fn new(screen_id: impl Into<String>) -> Self {
        Self {
            screen_id: screen_id.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Canonical cache key: `screen_id?k=v&k=v` with params in key order.
    ///
    /// `%`, `&`, `=` and `?` are percent-escaped in every component, so two
    /// distinct requests never share a key.
    pub fn cache_key(&self) -> String {
        let mut key = String::with_capacity(self.screen_id.len());
        escape_into(&mut key, &self.screen_id);
        for (index, (name, value)) in self.params.iter().enumerate() {
            key.push(if index == 0 { '?' } else { '&' });
            escape_into(&mut key, name);
            key.push('=');
            escape_into(&mut key, value);
        }
        key
    }
}

fn escape_into(out: &mut String, component: &str) {
    for c in component.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '?' => out.push_str("%3F"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_sorts_params() {
        let request = ScreenRequest::new("feed").param("page", "2").param("filter", "new");
        assert_eq!(request.cache_key(), "feed?filter=new&page=2");
        assert_eq!(ScreenRequest::new("home").cache_key(), "home");
    }

    #[test]
    fn cache_key_escapes_separators() {
        let packed = ScreenRequest::new("feed").param("page", "2&q=x");
        let split = ScreenRequest::new("feed").param("page", "2").param("q", "x");

        assert_eq!(packed.cache_key(), "feed?page=2%26q%3Dx");
        assert_eq!(split.cache_key(), "feed?page=2&q=x");
        assert_eq!(ScreenRequest::new("a?b=c").cache_key(), "a%3Fb%3Dc");
        assert_eq!(ScreenRequest::new("100%").cache_key(), "100%25");
    }

    #[test]
    fn deserializes_minimal_screen() {
        let screen: Screen = serde_json::from_value(json!({
            "id": "home",
            "root": {"id": "r", "component": "column", "children": [
                {"id": "title", "component": "text", "template": "Hi @{name}"}
            ]}
        }))
        .unwrap();

        assert_eq!(screen.version, 0);
        let root = screen.root.unwrap();
        assert_eq!(root.children[0].template.as_deref(), Some("Hi @{name}"));
    }
}

//! Template interpolation and condition evaluation.
//!
//! Everything here runs on the render path: reads go through
//! [`VariableSource::peek`] and never suspend or mutate state.

use std::fmt::Write as _;

use super::condition::Condition;
use crate::variables::{Scope, VariableStore, VariableValue};

const PLACEHOLDER_OPEN: &str = "@{";
const PLACEHOLDER_CLOSE: char = '}';

/// Non-suspending view of variable state.
pub trait VariableSource {
    fn peek(&self, key: &str, scope: &Scope) -> Option<VariableValue>;
}

impl VariableSource for VariableStore {
    fn peek(&self, key: &str, scope: &Scope) -> Option<VariableValue> {
        VariableStore::peek(self, key, scope)
    }
}

/// Stateless evaluator bound to a variable source and a screen identity.
#[derive(Debug, Clone)]
pub struct BindingResolver<S> {
    source: S,
    screen_id: Option<String>,
}

impl<S: VariableSource> BindingResolver<S> {
    pub fn new(source: S, screen_id: Option<String>) -> Self {
        Self { source, screen_id }
    }

    pub fn screen_id(&self) -> Option<&str> {
        self.screen_id.as_deref()
    }

    /// Look a key up in the screen scope first, then globally.
    pub fn resolve(&self, key: &str) -> Option<VariableValue> {
        if let Some(screen_id) = &self.screen_id {
            if let Some(value) = self.source.peek(key, &Scope::screen(screen_id.as_str())) {
                return Some(value);
            }
        }
        self.source.peek(key, &Scope::Global)
    }

    /// Text for a binding.
    ///
    /// With a template, every `@{ key }` placeholder is replaced by the
    /// stringified value; unresolved placeholders become empty. Without one,
    /// `key` is resolved directly. Never fails.
    pub fn text(&self, key: Option<&str>, template: Option<&str>) -> String {
        if let Some(template) = template {
            return self.interpolate(template);
        }
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => self
                .resolve(key)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn interpolate(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
            out.push_str(&rest[..start]);
            let inner = &rest[start + PLACEHOLDER_OPEN.len()..];
            let Some(end) = inner.find(PLACEHOLDER_CLOSE) else {
                // Unterminated placeholder stays literal.
                out.push_str(&rest[start..]);
                return out;
            };

            if let Some(value) = self.resolve(inner[..end].trim()) {
                let _ = write!(out, "{}", value);
            }
            rest = &inner[end + 1..];
        }

        out.push_str(rest);
        out
    }

    /// `None` is visible. An unresolved key yields `!exists`; a resolved one
    /// compares against `equals` (or uses truthiness), then applies `negate`.
    pub fn is_visible(&self, condition: Option<&Condition>) -> bool {
        let Some(condition) = condition else {
            return true;
        };

        let Some(value) = self.resolve(&condition.key) else {
            return !condition.exists;
        };

        let matched = match &condition.equals {
            Some(expected) => &value == expected,
            None => value.is_truthy(),
        };
        matched != condition.negate
    }

    /// `false` whenever `base` is false, without evaluating the condition.
    pub fn is_enabled(&self, base: bool, condition: Option<&Condition>) -> bool {
        base && self.is_visible(condition)
    }
}

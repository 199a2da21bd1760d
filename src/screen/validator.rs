//! Structural validation of incoming screens.
//!
//! Validation never fails fast: every violation is collected and returned as
//! data. A screen with no issues is accepted unchanged.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::model::{Node, Screen};

/// Safety limits enforced on a screen before it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    pub max_actions: usize,
    pub max_triggers: usize,
    pub max_children_per_node: usize,
    pub max_depth: usize,
    pub max_template_length: usize,
    pub max_nodes: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_actions: 256,
            max_triggers: 128,
            max_children_per_node: 256,
            max_depth: 32,
            max_template_length: 4096,
            max_nodes: 2000,
        }
    }
}

/// Machine-readable issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    BlankScreenId,
    NegativeVersion,
    ActionsLimit,
    TriggersLimit,
    DuplicateNodeId,
    ChildrenLimit,
    DepthLimit,
    TemplateLimit,
    NodesLimit,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlankScreenId => "blank_screen_id",
            Self::NegativeVersion => "negative_version",
            Self::ActionsLimit => "actions_limit",
            Self::TriggersLimit => "triggers_limit",
            Self::DuplicateNodeId => "duplicate_node_id",
            Self::ChildrenLimit => "children_limit",
            Self::DepthLimit => "depth_limit",
            Self::TemplateLimit => "template_limit",
            Self::NodesLimit => "nodes_limit",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    /// Location inside the screen, e.g. `sections[0].contents[1].children[2]`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

/// Validate a screen against `limits`, returning every issue found.
pub fn validate(screen: &Screen, limits: &ValidationLimits) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if screen.id.trim().is_empty() {
        issues.push(ValidationIssue::new(
            IssueCode::BlankScreenId,
            "id",
            "Screen id is blank",
        ));
    }
    if screen.version < 0 {
        issues.push(ValidationIssue::new(
            IssueCode::NegativeVersion,
            "version",
            format!("Version {} is negative", screen.version),
        ));
    }
    if screen.actions.len() > limits.max_actions {
        issues.push(ValidationIssue::new(
            IssueCode::ActionsLimit,
            "actions",
            format!(
                "{} actions exceed the limit of {}",
                screen.actions.len(),
                limits.max_actions
            ),
        ));
    }
    if screen.triggers.len() > limits.max_triggers {
        issues.push(ValidationIssue::new(
            IssueCode::TriggersLimit,
            "triggers",
            format!(
                "{} triggers exceed the limit of {}",
                screen.triggers.len(),
                limits.max_triggers
            ),
        ));
    }

    let mut walker = TreeWalker {
        limits,
        seen_ids: HashSet::new(),
        visited: 0,
        issues: &mut issues,
    };

    if let Some(top) = &screen.scaffold.top {
        walker.walk(top, "scaffold.top".to_string());
    }
    for (section_index, section) in screen.sections.iter().enumerate() {
        for (index, node) in section.contents.iter().enumerate() {
            walker.walk(node, format!("sections[{}].contents[{}]", section_index, index));
        }
    }
    if let Some(root) = &screen.root {
        walker.walk(root, "root".to_string());
    }
    if let Some(bottom) = &screen.scaffold.bottom {
        walker.walk(bottom, "scaffold.bottom".to_string());
    }

    let visited = walker.visited;
    if visited > limits.max_nodes {
        issues.push(ValidationIssue::new(
            IssueCode::NodesLimit,
            "",
            format!(
                "{} nodes exceed the limit of {}",
                visited, limits.max_nodes
            ),
        ));
    }

    if !issues.is_empty() {
        tracing::debug!(
            screen_id = %screen.id,
            issues = issues.len(),
            nodes = visited,
            "Screen failed structural validation"
        );
    }
    issues
}

struct TreeWalker<'a> {
    limits: &'a ValidationLimits,
    seen_ids: HashSet<&'a str>,
    visited: usize,
    issues: &'a mut Vec<ValidationIssue>,
}

impl<'a> TreeWalker<'a> {
    /// Depth-first, pre-order, iterative so that hostile nesting cannot
    /// exhaust the stack. `start` sits at depth 1.
    fn walk(&mut self, start: &'a Node, start_path: String) {
        let mut stack: Vec<(&'a Node, usize, String)> = vec![(start, 1, start_path)];

        while let Some((node, depth, path)) = stack.pop() {
            self.visited += 1;
            self.check_node(node, depth, &path);

            for (index, child) in node.children.iter().enumerate().rev() {
                stack.push((child, depth + 1, format!("{}.children[{}]", path, index)));
            }
        }
    }

    fn check_node(&mut self, node: &'a Node, depth: usize, path: &str) {
        let limits = self.limits;

        if !node.id.is_empty() && !self.seen_ids.insert(node.id.as_str()) {
            self.issues.push(ValidationIssue::new(
                IssueCode::DuplicateNodeId,
                path,
                format!("Node id '{}' is used more than once", node.id),
            ));
        }

        if node.children.len() > limits.max_children_per_node {
            self.issues.push(ValidationIssue::new(
                IssueCode::ChildrenLimit,
                path,
                format!(
                    "{} children exceed the limit of {}",
                    node.children.len(),
                    limits.max_children_per_node
                ),
            ));
        }

        // Reported once per offending branch: deeper descendants are covered.
        if depth == limits.max_depth + 1 {
            self.issues.push(ValidationIssue::new(
                IssueCode::DepthLimit,
                path,
                format!("Depth {} exceeds the limit of {}", depth, limits.max_depth),
            ));
        }

        if let Some(template) = &node.template {
            let length = template.chars().count();
            if length > limits.max_template_length {
                self.issues.push(ValidationIssue::new(
                    IssueCode::TemplateLimit,
                    path,
                    format!(
                        "Template length {} exceeds the limit of {}",
                        length, limits.max_template_length
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::model::Section;

    fn leaf(id: &str) -> Node {
        Node::new(id, "text")
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|issue| issue.code).collect()
    }

    #[test]
    fn valid_screen_has_no_issues() {
        let screen = Screen::new("home")
            .with_root(Node::new("root", "column").with_children(vec![leaf("a"), leaf("b")]));
        assert!(validate(&screen, &ValidationLimits::default()).is_empty());
    }

    #[test]
    fn header_issues_accumulate() {
        let mut screen = Screen::new("  ");
        screen.version = -1;
        let limits = ValidationLimits::default();

        assert_eq!(
            codes(&validate(&screen, &limits)),
            vec![IssueCode::BlankScreenId, IssueCode::NegativeVersion]
        );
    }

    #[test]
    fn duplicate_ids_across_regions_are_reported() {
        let mut screen = Screen::new("home").with_root(leaf("same"));
        screen.scaffold.top = Some(leaf("same"));
        screen.sections.push(Section {
            id: "s".to_string(),
            contents: vec![leaf("other")],
        });

        let issues = validate(&screen, &ValidationLimits::default());
        assert_eq!(codes(&issues), vec![IssueCode::DuplicateNodeId]);
        // Top is visited first, so the root is the duplicate.
        assert_eq!(issues[0].path, "root");
    }

    #[test]
    fn depth_counts_from_one_in_every_region() {
        let limits = ValidationLimits {
            max_depth: 2,
            ..ValidationLimits::default()
        };
        let chain = Node::new("a", "box")
            .with_children(vec![Node::new("b", "box").with_children(vec![leaf("c")])]);
        let mut screen = Screen::new("home");
        screen.scaffold.bottom = Some(chain);

        let issues = validate(&screen, &limits);
        assert_eq!(codes(&issues), vec![IssueCode::DepthLimit]);
        assert_eq!(issues[0].path, "scaffold.bottom.children[0].children[0]");
    }

    #[test]
    fn children_and_template_limits() {
        let limits = ValidationLimits {
            max_children_per_node: 1,
            max_template_length: 3,
            ..ValidationLimits::default()
        };
        let root = Node::new("root", "column")
            .with_children(vec![leaf("a").with_template("long!"), leaf("b")]);
        let issues = validate(&Screen::new("home").with_root(root), &limits);

        assert_eq!(
            codes(&issues),
            vec![IssueCode::ChildrenLimit, IssueCode::TemplateLimit]
        );
        assert_eq!(issues[1].path, "root.children[0]");
    }

    #[test]
    fn node_limit_reported_once_alongside_other_issues() {
        let children: Vec<Node> = (0..2999).map(|i| leaf(&format!("n{}", i))).collect();
        let mut screen =
            Screen::new("big").with_root(Node::new("root", "column").with_children(children));
        screen.version = -3;
        let limits = ValidationLimits {
            max_nodes: 2000,
            max_children_per_node: 5000,
            ..ValidationLimits::default()
        };

        let issues = validate(&screen, &limits);
        let node_issues = issues
            .iter()
            .filter(|issue| issue.code == IssueCode::NodesLimit)
            .count();
        assert_eq!(node_issues, 1);
        assert!(codes(&issues).contains(&IssueCode::NegativeVersion));
        assert_eq!(issues.len(), 2);
    }
}

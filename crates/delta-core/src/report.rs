//! Report tree handed to the presentation layer.
//!
//! A `ReportTree` is an ordered rose tree. The root is the section title, each
//! record is one child, and a record's attributes hang below it. Trees are
//! built bottom-up and expose no mutators once built.

use crate::record::VulnerabilityRecord;
use crate::types::Severity;
use serde::Serialize;

/// What a node represents, so renderers can style it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Root of a tree, labeled with the section title
    Section,
    /// One normalized record, labeled with its identifier
    Record,
    /// `name : value` attribute line
    Field,
    /// Named container for nested values
    Group,
    /// Free text line
    Text,
    /// Informational "not detected" leaf
    Notice,
    /// Visible error leaf carrying the failure cause
    Error,
}

/// Emphasis hint for a node's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Highlight {
    /// Colored by severity level
    Severity(Severity),
    /// Strong emphasis
    Strong,
    /// Mild emphasis
    Subtle,
}

/// A single node of a report tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportNode {
    kind: NodeKind,
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    highlight: Option<Highlight>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ReportNode>,
}

impl ReportNode {
    fn new(kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            value: None,
            highlight: None,
            children: Vec::new(),
        }
    }

    /// Record node labeled with the record identifier.
    #[must_use]
    pub fn record(identifier: impl Into<String>) -> Self {
        Self::new(NodeKind::Record, identifier)
    }

    /// `name : value` attribute.
    #[must_use]
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut node = Self::new(NodeKind::Field, name);
        node.value = Some(value.into());
        node
    }

    /// Named group; add children with [`ReportNode::with_child`].
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(NodeKind::Group, name)
    }

    /// Group holding one child line per item.
    #[must_use]
    pub fn list<I, S>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        items
            .into_iter()
            .fold(Self::group(name), |group, item| {
                group.with_child(Self::text(item))
            })
    }

    /// Free text line.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Text, text)
    }

    /// "not detected" notice.
    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(NodeKind::Notice, message)
    }

    /// Error leaf.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NodeKind::Error, message)
    }

    /// Append a child.
    #[must_use]
    pub fn with_child(mut self, child: ReportNode) -> Self {
        self.children.push(child);
        self
    }

    /// Attach an emphasis hint.
    #[must_use]
    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Label (title, identifier, field name, or text).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Field value, for `Field` nodes.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Emphasis hint, if any.
    #[must_use]
    pub fn highlight(&self) -> Option<&Highlight> {
        self.highlight.as_ref()
    }

    /// Child nodes in order.
    #[must_use]
    pub fn children(&self) -> &[ReportNode] {
        &self.children
    }

    /// First child with the given label.
    #[must_use]
    pub fn child(&self, label: &str) -> Option<&ReportNode> {
        self.children.iter().find(|c| c.label == label)
    }

    /// Value of the first `Field` child named `name`.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.kind == NodeKind::Field && c.label == name)
            .and_then(ReportNode::value)
    }
}

/// One section's complete, immutable report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTree {
    root: ReportNode,
}

impl ReportTree {
    /// Tree with a single "not detected" notice.
    #[must_use]
    pub fn not_detected(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            root: ReportNode::new(NodeKind::Section, title).with_child(ReportNode::notice(message)),
        }
    }

    /// Tree with a single error leaf.
    #[must_use]
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            root: ReportNode::new(NodeKind::Section, title).with_child(ReportNode::error(message)),
        }
    }

    /// Section title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.root.label
    }

    /// Root node.
    #[must_use]
    pub fn root(&self) -> &ReportNode {
        &self.root
    }

    /// Record nodes in order.
    pub fn records(&self) -> impl Iterator<Item = &ReportNode> {
        self.root
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Record)
    }

    /// Whether the tree is the "not detected" shape.
    #[must_use]
    pub fn is_not_detected(&self) -> bool {
        matches!(self.root.children.as_slice(), [only] if only.kind == NodeKind::Notice)
    }

    /// Error message, if the tree is an error leaf.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.root
            .children
            .iter()
            .find(|c| c.kind == NodeKind::Error)
            .map(ReportNode::label)
    }
}

/// Collects record nodes and produces a [`ReportTree`].
///
/// A builder that received no records yields the notice shape.
#[derive(Debug)]
pub struct ReportBuilder {
    title: String,
    not_detected: String,
    nodes: Vec<ReportNode>,
}

impl ReportBuilder {
    /// Start a section with the notice text used when nothing is added.
    #[must_use]
    pub fn new(title: impl Into<String>, not_detected: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            not_detected: not_detected.into(),
            nodes: Vec::new(),
        }
    }

    /// Render and append a record.
    pub fn push_record(&mut self, record: &VulnerabilityRecord) -> &mut Self {
        self.nodes.push(record.to_node());
        self
    }

    /// Append an already rendered record node.
    pub fn push_node(&mut self, node: ReportNode) -> &mut Self {
        self.nodes.push(node);
        self
    }

    /// Number of records added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no records were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finish the tree.
    #[must_use]
    pub fn build(self) -> ReportTree {
        if self.nodes.is_empty() {
            return ReportTree::not_detected(self.title, self.not_detected);
        }

        let root = self
            .nodes
            .into_iter()
            .fold(ReportNode::new(NodeKind::Section, self.title), ReportNode::with_child);
        ReportTree { root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_yields_notice() {
        let tree = ReportBuilder::new("Metasploit", "Exploit not detected").build();

        assert_eq!(tree.title(), "Metasploit");
        assert!(tree.is_not_detected());
        assert_eq!(tree.records().count(), 0);
        assert_eq!(tree.root().children().len(), 1);
        assert_eq!(tree.root().children()[0].label(), "Exploit not detected");
        assert!(tree.error_message().is_none());
    }

    #[test]
    fn test_builder_keeps_record_order() {
        let mut builder = ReportBuilder::new("CISA", "CVE or CWE not detected");
        builder
            .push_node(ReportNode::record("CVE-2021-44228"))
            .push_node(ReportNode::record("CVE-2021-45046"));
        assert_eq!(builder.len(), 2);

        let tree = builder.build();
        let ids: Vec<&str> = tree.records().map(ReportNode::label).collect();
        assert_eq!(ids, vec!["CVE-2021-44228", "CVE-2021-45046"]);
        assert!(!tree.is_not_detected());
    }

    #[test]
    fn test_error_tree() {
        let tree = ReportTree::error("Score", "Error: 503");
        assert_eq!(tree.error_message(), Some("Error: 503"));
        assert!(!tree.is_not_detected());
        assert_eq!(tree.records().count(), 0);
    }

    #[test]
    fn test_list_node() {
        let node = ReportNode::list("CWE", ["CWE-20", "CWE-917"]);
        assert_eq!(node.kind(), NodeKind::Group);
        let labels: Vec<&str> = node.children().iter().map(ReportNode::label).collect();
        assert_eq!(labels, vec!["CWE-20", "CWE-917"]);
    }

    #[test]
    fn test_field_lookup() {
        let node = ReportNode::record("CVE-2021-44228")
            .with_child(ReportNode::field("Rank", "1"))
            .with_child(ReportNode::group("Rank"));
        assert_eq!(node.field_value("Rank"), Some("1"));
        assert!(node.field_value("Reports").is_none());
    }
}

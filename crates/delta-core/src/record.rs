//! The normalized record shape every source adapter produces.

use crate::report::{Highlight, ReportNode};
use crate::types::Severity;
use serde::Serialize;

/// Source-specific extra value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Single line of text
    Text(String),
    /// Single line with an emphasis hint
    Emphasized(String, Highlight),
    /// Multi-line text shown below its name
    Block(String),
    /// Ordered list of strings
    List(Vec<String>),
}

/// A vulnerability, exploit, template, or weakness entry from one source.
///
/// Every source surfaces a different subset of these fields; only
/// `identifier` is required.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerabilityRecord {
    /// Display key: CVE/CWE id, repository name, or module path
    pub identifier: String,
    /// Human-readable name
    pub title: Option<String>,
    /// Free text description
    pub description: Option<String>,
    /// Normalized severity
    pub severity: Option<Severity>,
    score_metrics: Vec<(String, f64)>,
    /// URLs, CWE ids, or query strings
    pub references: Vec<String>,
    /// Authors in source order
    pub authors: Vec<String>,
    extra_fields: Vec<(String, FieldValue)>,
    /// Scores and extra fields interleaved in insertion order
    #[serde(skip)]
    layout: Vec<Attribute>,
}

/// Position of one scalar attribute in the rendered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Score(usize),
    Extra(usize),
}

impl VulnerabilityRecord {
    /// Create a record with only its identifier set.
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            description: None,
            severity: None,
            score_metrics: Vec::new(),
            references: Vec::new(),
            authors: Vec::new(),
            extra_fields: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Set the title; empty strings are ignored.
    #[must_use]
    pub fn with_title(mut self, title: Option<impl Into<String>>) -> Self {
        self.title = non_empty(title);
        self
    }

    /// Set the description; empty strings are ignored.
    #[must_use]
    pub fn with_description(mut self, description: Option<impl Into<String>>) -> Self {
        self.description = non_empty(description);
        self
    }

    /// Set the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    /// Append a named score.
    #[must_use]
    pub fn with_score(mut self, name: impl Into<String>, value: f64) -> Self {
        self.layout.push(Attribute::Score(self.score_metrics.len()));
        self.score_metrics.push((name.into(), value));
        self
    }

    /// Append references, skipping blanks.
    #[must_use]
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(
            references
                .into_iter()
                .map(Into::into)
                .filter(|r: &String| !r.trim().is_empty()),
        );
        self
    }

    /// Append authors, skipping blanks.
    #[must_use]
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors.extend(
            authors
                .into_iter()
                .map(Into::into)
                .filter(|a: &String| !a.trim().is_empty()),
        );
        self
    }

    /// Append an extra field. Empty text and empty lists are dropped.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        let keep = match &value {
            FieldValue::Text(s) | FieldValue::Emphasized(s, _) | FieldValue::Block(s) => {
                !s.trim().is_empty()
            }
            FieldValue::List(items) => !items.is_empty(),
        };
        if keep {
            self.layout.push(Attribute::Extra(self.extra_fields.len()));
            self.extra_fields.push((name.into(), value));
        }
        self
    }

    /// Append an optional single-line extra field.
    #[must_use]
    pub fn with_text(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.with_extra(name, FieldValue::Text(v.into())),
            None => self,
        }
    }

    /// Named numeric scores, in insertion order.
    #[must_use]
    pub fn score_metrics(&self) -> &[(String, f64)] {
        &self.score_metrics
    }

    /// Source-specific values, in insertion order.
    #[must_use]
    pub fn extra_fields(&self) -> &[(String, FieldValue)] {
        &self.extra_fields
    }

    /// Look up a score by name.
    #[must_use]
    pub fn score(&self, name: &str) -> Option<f64> {
        self.score_metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Look up an extra field by name.
    #[must_use]
    pub fn extra(&self, name: &str) -> Option<&FieldValue> {
        self.extra_fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Render into a record node.
    ///
    /// Attribute order: Name, Author(s), Severity, then scores and extra
    /// fields in the order they were added, then Description, References.
    #[must_use]
    pub fn to_node(&self) -> ReportNode {
        let mut node = ReportNode::record(&self.identifier);

        if let Some(title) = &self.title {
            node = node.with_child(ReportNode::field("Name", title));
        }

        node = match self.authors.as_slice() {
            [] => node,
            [single] => node.with_child(ReportNode::field("Author", single)),
            many => node.with_child(ReportNode::list("Author", many.iter().cloned())),
        };

        if let Some(severity) = &self.severity {
            node = node.with_child(
                ReportNode::field("Severity", severity.as_str())
                    .with_highlight(Highlight::Severity(severity.clone())),
            );
        }

        for attribute in &self.layout {
            let child = match *attribute {
                Attribute::Score(i) => {
                    let (name, score) = &self.score_metrics[i];
                    ReportNode::field(name, score.to_string())
                }
                Attribute::Extra(i) => {
                    let (name, value) = &self.extra_fields[i];
                    render_extra(name, value)
                }
            };
            node = node.with_child(child);
        }

        if let Some(description) = &self.description {
            node = node.with_child(
                ReportNode::group("Description").with_child(ReportNode::text(description)),
            );
        }

        if !self.references.is_empty() {
            node = node.with_child(ReportNode::list("References", self.references.iter().cloned()));
        }

        node
    }
}

fn render_extra(name: &str, value: &FieldValue) -> ReportNode {
    match value {
        FieldValue::Text(text) => ReportNode::field(name, text),
        FieldValue::Emphasized(text, highlight) => {
            ReportNode::field(name, text).with_highlight(highlight.clone())
        }
        FieldValue::Block(text) => ReportNode::group(name).with_child(ReportNode::text(text)),
        FieldValue::List(items) => ReportNode::list(name, items.iter().cloned()),
    }
}

fn non_empty(value: Option<impl Into<String>>) -> Option<String> {
    value.map(Into::into).filter(|s| !s.trim().is_empty())
}

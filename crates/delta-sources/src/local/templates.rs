//! Nuclei scanner templates (YAML).

use super::{read_snapshot_file, LocalSnapshot, EXPLOIT_NOT_DETECTED};
use crate::error::SnapshotError;
use crate::snapshot::{RefreshOutcome, SnapshotRefresher, SnapshotSpec};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use base64::Engine;
use delta_core::{FieldValue, ReportBuilder, ReportTree, SearchTerm, Severity, VulnerabilityRecord};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fields a template must match in, beyond the raw text scan.
const MATCH_FIELDS: [&str; 5] = ["id", "name", "author", "description", "tags"];

const SHODAN_SEARCH_URL: &str = "https://www.shodan.io/search?query=";
const FOFA_SEARCH_URL: &str = "https://en.fofa.info/result?qbase64=";

/// Searches a local snapshot of the Nuclei templates repository.
pub struct TemplateSource {
    snapshot: LocalSnapshot,
}

impl TemplateSource {
    /// Create a source reading `<cache_dir>/nuclei-templates-main`.
    #[must_use]
    pub fn new(cache_dir: &Path, refresher: Arc<dyn SnapshotRefresher>) -> Self {
        Self {
            snapshot: LocalSnapshot::new(SnapshotSpec::NUCLEI_TEMPLATES, cache_dir, refresher),
        }
    }

    /// Read templates from `root` instead of the cache layout.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.snapshot.set_root(root.into());
        self
    }

    /// Set how many templates are parsed at once.
    #[must_use]
    pub fn with_parse_concurrency(mut self, n: usize) -> Self {
        self.snapshot.set_parse_concurrency(n);
        self
    }

    /// Matching templates as records, in snapshot walk order.
    pub async fn find(&self, term: &SearchTerm) -> Vec<VulnerabilityRecord> {
        let paths = self.snapshot.matching_files(term.as_str(), "yaml").await;
        debug!(
            root = %self.snapshot.root().display(),
            candidates = paths.len(),
            "template candidates found"
        );

        let needle = term.as_str().to_lowercase();
        self.snapshot
            .parse_each(paths, |path| {
                let needle = needle.clone();
                async move { load_template(&path, &needle).await.into_iter().collect() }
            })
            .await
    }
}

#[async_trait]
impl SourceAdapter for TemplateSource {
    fn source_id(&self) -> &'static str {
        "nuclei-templates"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let mut report = ReportBuilder::new(title, EXPLOIT_NOT_DETECTED);
        for record in self.find(term).await {
            report.push_record(&record);
        }
        report.build()
    }

    fn is_snapshot_backed(&self) -> bool {
        true
    }

    async fn update(&self) -> Result<RefreshOutcome, SnapshotError> {
        self.snapshot.refresh().await
    }
}

async fn load_template(path: &Path, needle: &str) -> Option<VulnerabilityRecord> {
    let contents = match read_snapshot_file(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "skipping unreadable template");
            return None;
        }
    };

    let document: Value = match serde_yaml::from_str(&contents) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unparseable template");
            return None;
        }
    };

    let template = Template::from_document(&document)?;
    if template.matches(needle) {
        Some(template.into_record(path))
    } else {
        debug!(path = %path.display(), "raw match outside displayed fields");
        None
    }
}

/// The parts of a template document that are displayed or matched.
#[derive(Debug, Default)]
struct Template {
    id: Option<String>,
    name: Option<String>,
    author: Option<String>,
    severity: Option<String>,
    description: Option<String>,
    tags: Option<String>,
    impact: Option<String>,
    remediation: Option<String>,
    references: Vec<String>,
    shodan_queries: Vec<String>,
    fofa_queries: Vec<String>,
}

impl Template {
    /// `None` when the document has no `info` mapping.
    fn from_document(document: &Value) -> Option<Self> {
        let info = document.get("info")?;
        if !info.is_mapping() {
            return None;
        }

        let text = |key: &str| info.get(key).and_then(as_text);
        let metadata = info.get("metadata");
        let query = |key: &str| {
            metadata
                .and_then(|m| m.get(key))
                .map(as_list)
                .unwrap_or_default()
        };

        Some(Self {
            id: document.get("id").and_then(as_text),
            name: text("name"),
            author: text("author"),
            severity: text("severity"),
            description: text("description"),
            tags: text("tags"),
            impact: text("impact"),
            remediation: text("remediation"),
            references: info.get("reference").map(as_list).unwrap_or_default(),
            shodan_queries: query("shodan-query"),
            fofa_queries: query("fofa-query"),
        })
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => self.id.as_deref(),
            "name" => self.name.as_deref(),
            "author" => self.author.as_deref(),
            "description" => self.description.as_deref(),
            "tags" => self.tags.as_deref(),
            _ => None,
        }
    }

    /// Case-insensitive containment in any of the matched fields.
    fn matches(&self, needle_lower: &str) -> bool {
        MATCH_FIELDS.iter().any(|name| {
            self.field(name)
                .filter(|value| !value.is_empty())
                .is_some_and(|value| value.to_lowercase().contains(needle_lower))
        })
    }

    fn into_record(self, path: &Path) -> VulnerabilityRecord {
        let identifier = self.id.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        let shodan = self
            .shodan_queries
            .iter()
            .map(|q| format!("{SHODAN_SEARCH_URL}{q}"))
            .collect();
        let fofa = self
            .fofa_queries
            .iter()
            .map(String::as_str)
            .map(fofa_url)
            .collect();

        VulnerabilityRecord::new(identifier)
            .with_title(self.name)
            .with_authors(self.author)
            .with_severity(self.severity.as_deref().map(Severity::parse))
            .with_text("Tags", self.tags)
            .with_extra("Impact", FieldValue::Block(self.impact.unwrap_or_default()))
            .with_text("Remediation", self.remediation)
            .with_extra("Shodan Query", FieldValue::List(shodan))
            .with_extra("Fofa Query", FieldValue::List(fofa))
            .with_description(self.description)
            .with_references(self.references)
    }
}

/// Fofa takes its query base64-encoded.
fn fofa_url(query: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(query.as_bytes());
    format!("{FOFA_SEARCH_URL}{encoded}")
}

/// Scalar as text; sequences joined with `, `.
fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(items) => {
            let parts: Vec<String> = items.iter().filter_map(as_text).collect();
            Some(parts.join(", "))
        }
        _ => None,
    };
    text.filter(|s| !s.is_empty())
}

/// Scalar as a one-item list; sequences item by item.
fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(as_text).collect(),
        other => as_text(other).into_iter().collect(),
    }
}

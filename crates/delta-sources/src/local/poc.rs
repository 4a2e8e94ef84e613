//! Proof-of-concept repository index (PoC-in-GitHub, JSON).

use super::{read_snapshot_file, LocalSnapshot, EXPLOIT_NOT_DETECTED};
use crate::error::SnapshotError;
use crate::snapshot::{RefreshOutcome, SnapshotRefresher, SnapshotSpec};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{ReportBuilder, ReportTree, SearchTerm, VulnerabilityRecord};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One repository entry as listed in the index.
#[derive(Debug, Clone, Deserialize)]
pub struct PocRepository {
    /// `owner/name`
    pub full_name: String,
    /// Repository name
    #[serde(default)]
    pub name: Option<String>,
    /// Last push timestamp
    #[serde(default)]
    pub pushed_at: Option<String>,
    /// Repository owner
    #[serde(default)]
    pub owner: Option<PocOwner>,
    /// Star count
    #[serde(default)]
    pub stargazers_count: Option<u64>,
    /// Repository page
    #[serde(default)]
    pub html_url: Option<String>,
    /// Repository description
    #[serde(default)]
    pub description: Option<String>,
}

/// Repository owner.
#[derive(Debug, Clone, Deserialize)]
pub struct PocOwner {
    /// Account name
    pub login: String,
}

impl PocRepository {
    fn into_record(self) -> VulnerabilityRecord {
        VulnerabilityRecord::new(self.full_name)
            .with_title(self.name)
            .with_text("Date Published", self.pushed_at)
            .with_text("Author", self.owner.map(|o| o.login))
            .with_text("Stars", self.stargazers_count.map(|n| n.to_string()))
            .with_text("GitHub", self.html_url)
            .with_description(self.description)
    }
}

/// Searches a local snapshot of the PoC-in-GitHub index.
///
/// Every repository listed in a matching file is reported, including
/// entries that do not themselves mention the term.
pub struct PocSource {
    snapshot: LocalSnapshot,
}

impl PocSource {
    /// Create a source reading `<cache_dir>/PoC-in-GitHub-master`.
    #[must_use]
    pub fn new(cache_dir: &Path, refresher: Arc<dyn SnapshotRefresher>) -> Self {
        Self {
            snapshot: LocalSnapshot::new(SnapshotSpec::POC_IN_GITHUB, cache_dir, refresher),
        }
    }

    /// Read the index from `root` instead of the cache layout.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.snapshot.set_root(root.into());
        self
    }

    /// Set how many files are parsed at once.
    #[must_use]
    pub fn with_parse_concurrency(mut self, n: usize) -> Self {
        self.snapshot.set_parse_concurrency(n);
        self
    }

    /// Every repository of every matching file, in walk order.
    pub async fn find(&self, term: &SearchTerm) -> Vec<PocRepository> {
        let paths = self.snapshot.matching_files(term.as_str(), "json").await;
        debug!(candidates = paths.len(), "poc candidates found");

        self.snapshot
            .parse_each(paths, |path| async move { load_repositories(&path).await })
            .await
    }
}

#[async_trait]
impl SourceAdapter for PocSource {
    fn source_id(&self) -> &'static str {
        "poc-in-github"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let mut report = ReportBuilder::new(title, EXPLOIT_NOT_DETECTED);
        for repository in self.find(term).await {
            report.push_record(&repository.into_record());
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

async fn load_repositories(path: &Path) -> Vec<PocRepository> {
    let contents = match read_snapshot_file(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "skipping unreadable index file");
            return Vec::new();
        }
    };

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "skipping malformed index file");
        Vec::new()
    })
}

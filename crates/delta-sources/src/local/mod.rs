//! Sources backed by a locally cached repository snapshot.
//!
//! Each one narrows the snapshot with a raw substring scan, then parses the
//! matching files concurrently and normalizes them into records.

pub mod exploits;
pub mod extract;
pub mod poc;
pub mod templates;

pub use exploits::ExploitModuleSource;
pub use poc::PocSource;
pub use templates::TemplateSource;

use crate::error::{SnapshotError, SourceError};
use crate::snapshot::{find_files, RefreshOutcome, SnapshotRefresher, SnapshotSpec};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default number of files parsed at once.
const DEFAULT_PARSE_CONCURRENCY: usize = 8;

/// Notice shown when a snapshot holds nothing for the term.
pub(crate) const EXPLOIT_NOT_DETECTED: &str = "Exploit not detected";

/// Shared plumbing for a snapshot-backed source.
pub(crate) struct LocalSnapshot {
    spec: SnapshotSpec,
    root: PathBuf,
    refresher: Arc<dyn SnapshotRefresher>,
    parse_concurrency: usize,
}

impl LocalSnapshot {
    pub(crate) fn new(
        spec: SnapshotSpec,
        cache_dir: &Path,
        refresher: Arc<dyn SnapshotRefresher>,
    ) -> Self {
        Self {
            root: spec.local_dir(cache_dir),
            spec,
            refresher,
            parse_concurrency: DEFAULT_PARSE_CONCURRENCY,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn set_root(&mut self, root: PathBuf) {
        self.root = root;
    }

    pub(crate) fn set_parse_concurrency(&mut self, n: usize) {
        self.parse_concurrency = n.max(1);
    }

    /// Files whose raw text contains the term.
    pub(crate) async fn matching_files(&self, needle: &str, extension: &str) -> Vec<PathBuf> {
        find_files(&self.root, needle, extension).await
    }

    /// Parse files concurrently, keeping the input order of the results.
    pub(crate) async fn parse_each<T, F, Fut>(&self, paths: Vec<PathBuf>, parse: F) -> Vec<T>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        stream::iter(paths)
            .map(parse)
            .buffered(self.parse_concurrency)
            .flat_map(stream::iter)
            .collect()
            .await
    }

    pub(crate) async fn refresh(&self) -> Result<RefreshOutcome, SnapshotError> {
        self.refresher.refresh(&self.spec).await
    }
}

/// Read a snapshot file as UTF-8 text.
pub(crate) async fn read_snapshot_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::LocalIo {
            path: path.display().to_string(),
            source,
        })
}

//! The capability every data source implements.

use crate::error::SnapshotError;
use crate::snapshot::RefreshOutcome;
use async_trait::async_trait;
use delta_core::{ReportTree, SearchTerm};

/// A single data source able to answer a search with a report section.
///
/// Implementations must be thread-safe (Send + Sync) and must never fail:
/// every error is turned into tree content before `search` returns.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used in log lines.
    fn source_id(&self) -> &'static str;

    /// Search the source and build the section titled `title`.
    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree;

    /// Whether the source reads from a local snapshot that `update` refreshes.
    fn is_snapshot_backed(&self) -> bool {
        false
    }

    /// Refresh the backing snapshot, if any.
    ///
    /// # Errors
    /// Returns error if the snapshot download or extraction fails.
    async fn update(&self) -> Result<RefreshOutcome, SnapshotError> {
        Ok(RefreshOutcome::UpToDate)
    }
}

//! Locally cached repository snapshots: scanning and refreshing.

pub mod index;
pub mod refresh;

pub use index::find_files;
pub use refresh::{
    extract_archive, ArchiveRefresher, RefreshOutcome, SnapshotRefresher, SnapshotSpec,
};

//! Error taxonomy for source adapters.
//!
//! Adapters never let these escape `search`: [`SourceError::into_tree`] turns
//! each one into report content at the adapter boundary.

use delta_core::{DeltaError, ReportTree};
use thiserror::Error;

/// Errors a single source can hit while answering one search.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Source reachable, nothing matched
    #[error("no matching records")]
    NotFound,

    /// Term cannot be parsed into the shape this source requires
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    /// Transport failure
    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Error: {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Payload parsed but lacks the expected shape
    #[error("{0}")]
    SchemaMismatch(String),

    /// A cached snapshot file could not be read
    #[error("failed to read {path}: {source}")]
    LocalIo {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    /// Schema mismatch for a body that was not valid JSON.
    #[must_use]
    pub fn undecodable() -> Self {
        Self::SchemaMismatch("Error decoding JSON response.".to_string())
    }

    /// Whether this error should read as "nothing found" to the user.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::MalformedIdentifier(_))
    }

    /// Convert into section content.
    ///
    /// `NotFound` and `MalformedIdentifier` become the notice shape; every
    /// other failure becomes a visible error leaf with its cause.
    #[must_use]
    pub fn into_tree(self, title: &str, not_detected: &str) -> ReportTree {
        if self.is_not_found() {
            tracing::debug!(section = title, reason = %self, "source reported nothing");
            ReportTree::not_detected(title, not_detected)
        } else {
            tracing::warn!(section = title, error = %self, "source failed");
            ReportTree::error(title, self.to_string())
        }
    }
}

impl From<DeltaError> for SourceError {
    fn from(err: DeltaError) -> Self {
        match err {
            DeltaError::MalformedIdentifier(term) => Self::MalformedIdentifier(term),
            other => Self::SchemaMismatch(other.to_string()),
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors raised while refreshing a snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// HTTP failure
    #[error("download failed for {name}: {source}")]
    Download {
        /// Snapshot name
        name: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },

    /// Unexpected HTTP status
    #[error("unable to download {name}: HTTP status {status}")]
    Status {
        /// Snapshot name
        name: String,
        /// HTTP status code
        status: u16,
    },

    /// Archive could not be read
    #[error("invalid archive for {name}: {source}")]
    Archive {
        /// Snapshot name
        name: String,
        /// Underlying error
        #[source]
        source: zip::result::ZipError,
    },

    /// ETag store could not be parsed
    #[error("corrupt ETag store: {0}")]
    EtagStore(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background extraction task failed
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_becomes_notice() {
        let tree = SourceError::NotFound.into_tree("CISA", "CVE or CWE not detected");
        assert!(tree.is_not_detected());
        assert!(tree.error_message().is_none());
    }

    #[test]
    fn test_malformed_identifier_becomes_notice() {
        let tree = SourceError::MalformedIdentifier("CVE-BAD".to_string())
            .into_tree("CVE GitHub", "CVE not detected");
        assert!(tree.is_not_detected());
    }

    #[test]
    fn test_status_becomes_error_leaf() {
        let tree = SourceError::Status { status: 503 }.into_tree("Score", "CVE not detected");
        assert_eq!(tree.error_message(), Some("Error: 503"));
        assert!(!tree.is_not_detected());
    }

    #[test]
    fn test_schema_mismatch_becomes_error_leaf() {
        let tree = SourceError::undecodable().into_tree("CVE GitHub", "CVE not detected");
        assert_eq!(tree.error_message(), Some("Error decoding JSON response."));
    }

    #[test]
    fn test_from_delta_error() {
        let err: SourceError = DeltaError::MalformedIdentifier("x".to_string()).into();
        assert!(err.is_not_found());

        let err: SourceError = DeltaError::Validation("bad".to_string()).into();
        assert!(!err.is_not_found());
    }
}

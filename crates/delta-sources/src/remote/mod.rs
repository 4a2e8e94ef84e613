//! Sources queried over HTTP on every search.
//!
//! Each adapter performs exactly one request per search. Failures are turned
//! into section content through [`SourceError::into_tree`].

pub mod bug_bounty;
pub mod cve_registry;
pub mod epss;
pub mod kev;

pub use bug_bounty::{BountyQuery, BugBountySource};
pub use cve_registry::CveRegistrySource;
pub use epss::EpssSource;
pub use kev::KevSource;

use crate::error::Result;
use delta_core::{ReportBuilder, ReportNode, ReportTree};

/// Notice shown when a CVE lookup finds nothing.
pub(crate) const CVE_NOT_DETECTED: &str = "CVE not detected";

/// Build a section from a lookup result.
pub(crate) fn section(
    title: &str,
    not_detected: &str,
    result: Result<Vec<ReportNode>>,
) -> ReportTree {
    match result {
        Ok(nodes) => {
            let mut report = ReportBuilder::new(title, not_detected);
            for node in nodes {
                report.push_node(node);
            }
            report.build()
        }
        Err(e) => e.into_tree(title, not_detected),
    }
}

/// Collapse the blank-line pairs upstream descriptions use as paragraph breaks.
pub(crate) fn collapse_paragraphs(text: &str) -> String {
    text.replace("\n\n", "")
}

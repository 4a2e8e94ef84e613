//! Delta Core - Foundation crate for the Delta vulnerability intelligence tool.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the normalized report model that every source adapter produces.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SearchTerm`, `CveId`, `Severity`, `PriorityRank`)
//! - [`record`] - The common `VulnerabilityRecord` shape
//! - [`report`] - The `ReportTree` rose tree handed to the presentation layer
//!
//! # Example
//!
//! ```rust
//! use delta_core::{ReportBuilder, SearchTerm, VulnerabilityRecord};
//!
//! let term = SearchTerm::new("CVE-2021-44228").expect("non-empty term");
//! let mut report = ReportBuilder::new("CVE GitHub", "CVE not detected");
//! report.push_record(&VulnerabilityRecord::new(term.as_str()));
//! let tree = report.build();
//! assert_eq!(tree.records().count(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod record;
pub mod report;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, DisplayConfig, GeneralConfig, NetworkConfig, SearchConfig};
pub use error::{ConfigError, ConfigResult, DeltaError, Result};
pub use record::{FieldValue, VulnerabilityRecord};
pub use report::{Highlight, NodeKind, ReportBuilder, ReportNode, ReportTree};
pub use types::{CveId, PriorityRank, SearchTerm, Severity};

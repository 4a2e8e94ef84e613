//! Delta Sources - Source adapters and search aggregation.
//!
//! This crate knows how to query every vulnerability intelligence source Delta
//! supports and how to normalize each one into a [`delta_core::ReportTree`].
//!
//! # Features
//!
//! - Local snapshot sources: Nuclei templates, PoC-in-GitHub, Metasploit modules
//! - Remote sources: cvelistV5, FIRST EPSS, HackerOne GraphQL, CISA KEV
//! - ETag-aware snapshot refresh from zip archives
//! - Ordered, bounded-concurrency aggregation with per-source failure isolation
//!
//! # Example
//!
//! ```rust,ignore
//! use delta_core::{AppConfig, SearchTerm};
//! use delta_sources::{
//!     build_http_client, default_sections, AggregationController, ArchiveRefresher,
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_with_env()?;
//! let client = build_http_client(&config.network)?;
//! let cache_dir = config.snapshot_dir()?;
//! let refresher = Arc::new(ArchiveRefresher::new(client.clone(), &cache_dir));
//! let sections = default_sections(&config.search, &cache_dir, &client, refresher);
//!
//! let controller = AggregationController::new(sections)
//!     .with_concurrency(config.search.concurrent_sections);
//! let term = SearchTerm::new("CVE-2021-44228")?;
//! controller.run(&term, |tree| println!("{}", tree.title())).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod error;
pub mod http;
pub mod local;
pub mod remote;
pub mod snapshot;
pub mod source;

pub use aggregator::{default_sections, AggregationController, Section};
pub use error::{Result, SnapshotError, SourceError};
pub use http::build_http_client;
pub use local::{ExploitModuleSource, PocSource, TemplateSource};
pub use remote::{BountyQuery, BugBountySource, CveRegistrySource, EpssSource, KevSource};
pub use snapshot::{find_files, ArchiveRefresher, RefreshOutcome, SnapshotRefresher, SnapshotSpec};
pub use source::SourceAdapter;

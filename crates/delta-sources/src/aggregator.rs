//! Fan a search term out across every configured source.
//!
//! Sections run concurrently up to a limit but are always emitted in their
//! configured order. A source that panics still yields a section, holding a
//! single error leaf.

use crate::error::SnapshotError;
use crate::local::{ExploitModuleSource, PocSource, TemplateSource};
use crate::remote::{BountyQuery, BugBountySource, CveRegistrySource, EpssSource, KevSource};
use crate::snapshot::{RefreshOutcome, SnapshotRefresher};
use crate::source::SourceAdapter;
use delta_core::{ReportTree, SearchConfig, SearchTerm};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default number of sections searched at once.
const DEFAULT_CONCURRENCY: usize = 4;

/// A source paired with the title of the section it fills.
#[derive(Clone)]
pub struct Section {
    source: Arc<dyn SourceAdapter>,
    title: String,
}

impl Section {
    /// Pair a source with its section title.
    #[must_use]
    pub fn new(source: Arc<dyn SourceAdapter>, title: impl Into<String>) -> Self {
        Self {
            source,
            title: title.into(),
        }
    }

    /// Section title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The source behind this section.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn SourceAdapter> {
        &self.source
    }
}

/// Aborts the task when dropped, so cancelling a run stops in-flight searches.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs sections and hands their reports to the caller in order.
pub struct AggregationController {
    sections: Vec<Section>,
    concurrency: usize,
}

impl AggregationController {
    /// Create a controller over `sections`, in display order.
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            sections,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set how many sections run at once. `1` runs them one after another.
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Configured sections in order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Search every section and call `emit` once per section, in order.
    ///
    /// Returns the number of sections emitted.
    pub async fn run<F>(&self, term: &SearchTerm, mut emit: F) -> usize
    where
        F: FnMut(ReportTree),
    {
        let emitted = self
            .try_run(term, |_, tree| {
                emit(tree);
                Ok::<(), Infallible>(())
            })
            .await;
        match emitted {
            Ok(count) => count,
            Err(never) => match never {},
        }
    }

    /// Like [`run`](Self::run), but `emit` may fail.
    ///
    /// The first error stops the run and is returned. Sections still in
    /// flight are aborted and never emitted.
    pub async fn try_run<F, E>(&self, term: &SearchTerm, mut emit: F) -> Result<usize, E>
    where
        F: FnMut(&Section, ReportTree) -> Result<(), E>,
    {
        info!(
            term = term.as_str(),
            sections = self.sections.len(),
            concurrency = self.concurrency,
            "starting search"
        );

        let mut reports = stream::iter(self.sections.iter())
            .map(|section| async move {
                let tree = run_section(section.clone(), term.clone()).await;
                (section, tree)
            })
            .buffered(self.concurrency);

        let mut emitted = 0;
        while let Some((section, tree)) = reports.next().await {
            emit(section, tree)?;
            emitted += 1;
        }
        Ok(emitted)
    }

    /// Collect every section's report, in order.
    pub async fn run_collect(&self, term: &SearchTerm) -> Vec<ReportTree> {
        let mut trees = Vec::with_capacity(self.sections.len());
        self.run(term, |tree| trees.push(tree)).await;
        trees
    }

    /// Refresh every snapshot-backed source, in order.
    ///
    /// Failures are logged and do not stop the remaining refreshes.
    pub async fn update_all(&self) -> Vec<(String, Result<RefreshOutcome, SnapshotError>)> {
        let mut outcomes = Vec::new();
        for section in self.sections.iter().filter(|s| s.source.is_snapshot_backed()) {
            let outcome = section.source.update().await;
            match &outcome {
                Ok(result) => {
                    info!(section = section.title(), outcome = ?result, "snapshot refreshed");
                }
                Err(e) => {
                    warn!(section = section.title(), error = %e, "snapshot refresh failed");
                }
            }
            outcomes.push((section.title.clone(), outcome));
        }
        outcomes
    }
}

async fn run_section(section: Section, term: SearchTerm) -> ReportTree {
    let title = section.title.clone();
    let source_id = section.source.source_id();
    debug!(section = %title, source = source_id, "section started");

    let mut task = AbortOnDrop(tokio::spawn(async move {
        section.source.search(&term, &section.title).await
    }));

    match (&mut task.0).await {
        Ok(tree) => {
            debug!(section = %title, source = source_id, "section finished");
            tree
        }
        Err(e) => {
            error!(section = %title, source = source_id, error = %e, "section task failed");
            ReportTree::error(title, format!("Source failed unexpectedly: {e}"))
        }
    }
}

/// The standard section list, in display order.
///
/// Snapshot-backed sources read from `cache_dir` and refresh through the
/// shared `refresher`.
#[must_use]
pub fn default_sections(
    search: &SearchConfig,
    cache_dir: &Path,
    client: &Client,
    refresher: Arc<dyn SnapshotRefresher>,
) -> Vec<Section> {
    let parse = search.parse_concurrency;

    vec![
        Section::new(
            Arc::new(
                TemplateSource::new(cache_dir, refresher.clone()).with_parse_concurrency(parse),
            ),
            "Nuclei Templates",
        ),
        Section::new(
            Arc::new(PocSource::new(cache_dir, refresher.clone()).with_parse_concurrency(parse)),
            "POC in GitHub",
        ),
        Section::new(
            Arc::new(ExploitModuleSource::new(cache_dir, refresher).with_parse_concurrency(parse)),
            "Metasploit",
        ),
        Section::new(Arc::new(CveRegistrySource::new(client.clone())), "CVE GitHub"),
        Section::new(
            Arc::new(BugBountySource::new(client.clone(), BountyQuery::CweEntries)),
            "CWE HackerOne",
        ),
        Section::new(
            Arc::new(BugBountySource::new(client.clone(), BountyQuery::RankedCves)),
            "CVE HackerOne",
        ),
        Section::new(
            Arc::new(BugBountySource::new(client.clone(), BountyQuery::CveDetail)),
            "HackerOne Activity",
        ),
        Section::new(Arc::new(KevSource::new(client.clone())), "CISA"),
        Section::new(Arc::new(EpssSource::new(client.clone())), "Score"),
    ]
}

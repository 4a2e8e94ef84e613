//! CVE records from the cvelistV5 repository.

use super::{collapse_paragraphs, section, CVE_NOT_DETECTED};
use crate::error::{Result, SourceError};
use crate::http::{decode, fetch_json};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{CveId, ReportTree, SearchTerm, Severity, VulnerabilityRecord};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Raw file host of the CVE list repository.
pub const CVE_LIST_BASE_URL: &str = "https://raw.githubusercontent.com/CVEProject/cvelistV5/main/cves";

const INCOMPLETE_DOCUMENT: &str = "CVE data structure is incomplete or incorrect.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CveDocument {
    cve_metadata: CveMetadata,
    containers: Containers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CveMetadata {
    cve_id: String,
    #[serde(default)]
    date_published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Containers {
    cna: CnaContainer,
}

#[derive(Debug, Deserialize)]
struct CnaContainer {
    #[serde(default)]
    metrics: Vec<Metric>,
    descriptions: Vec<Description>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    #[serde(rename = "cvssV3_1", default)]
    cvss_v3_1: Option<CvssV31>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CvssV31 {
    base_score: f64,
    vector_string: String,
    #[serde(default)]
    base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Description {
    value: String,
}

impl CveDocument {
    fn into_record(self) -> Result<VulnerabilityRecord> {
        let cna = self.containers.cna;
        let description = cna
            .descriptions
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::SchemaMismatch(INCOMPLETE_DOCUMENT.to_string()))?;
        let cvss = cna.metrics.into_iter().find_map(|m| m.cvss_v3_1);

        let mut record = VulnerabilityRecord::new(self.cve_metadata.cve_id)
            .with_text("Published", self.cve_metadata.date_published)
            .with_description(Some(collapse_paragraphs(&description.value)));

        if let Some(cvss) = cvss {
            record = record
                .with_severity(cvss.base_severity.as_deref().map(Severity::parse))
                .with_score("Best Score", cvss.base_score)
                .with_text("Vector", Some(cvss.vector_string));
        }

        Ok(record)
    }
}

/// Looks up a single CVE document by id.
pub struct CveRegistrySource {
    client: Client,
    base_url: String,
}

impl CveRegistrySource {
    /// Create a source against the public repository.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, CVE_LIST_BASE_URL)
    }

    /// Create a source against another host serving the same layout.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// `<base>/<year>/<bucket>xxx/<id>.json`
    #[must_use]
    pub fn document_url(&self, cve: &CveId) -> String {
        format!(
            "{}/{}/{}xxx/{}.json",
            self.base_url.trim_end_matches('/'),
            cve.year(),
            cve.bucket(),
            cve.as_str()
        )
    }

    /// Fetch and normalize the CVE document for `term`.
    pub async fn lookup(&self, term: &SearchTerm) -> Result<VulnerabilityRecord> {
        let cve = term.as_cve()?;
        let url = self.document_url(&cve);
        debug!(%url, "fetching CVE document");

        let value = fetch_json(self.client.get(&url))
            .await
            .map_err(|e| match e {
                SourceError::Status { status: 404 } => SourceError::NotFound,
                other => other,
            })?;

        decode::<CveDocument>(value, INCOMPLETE_DOCUMENT)?.into_record()
    }
}

#[async_trait]
impl SourceAdapter for CveRegistrySource {
    fn source_id(&self) -> &'static str {
        "cve-registry"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let result = self.lookup(term).await.map(|record| vec![record.to_node()]);
        section(title, CVE_NOT_DETECTED, result)
    }
}

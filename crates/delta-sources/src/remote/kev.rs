//! CISA Known Exploited Vulnerabilities catalog.

use super::section;
use crate::error::{Result, SourceError};
use crate::http::{decode, fetch_json};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{FieldValue, Highlight, ReportTree, SearchTerm, VulnerabilityRecord};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Public catalog feed.
pub const KEV_FEED_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

const KEV_NOT_DETECTED: &str = "CVE or CWE not detected";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KevEntry {
    /// CVE id
    #[serde(rename = "cveID")]
    pub cve_id: String,
    /// Vendor or project name
    #[serde(default)]
    pub vendor_project: String,
    /// Affected product
    #[serde(default)]
    pub product: String,
    /// Catalog title
    #[serde(default)]
    pub vulnerability_name: String,
    /// Date added to the catalog
    #[serde(default)]
    pub date_added: String,
    /// Short description
    #[serde(default)]
    pub short_description: String,
    /// Required remediation
    #[serde(default)]
    pub required_action: String,
    /// Remediation due date
    #[serde(default)]
    pub due_date: String,
    /// `Known` or `Unknown`
    #[serde(default)]
    pub known_ransomware_campaign_use: String,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    /// Associated weaknesses
    #[serde(default)]
    pub cwes: Vec<String>,
}

impl KevEntry {
    /// Exact, ASCII case-insensitive match on the CVE id or any CWE.
    #[must_use]
    pub fn matches(&self, term: &str) -> bool {
        self.cve_id.eq_ignore_ascii_case(term)
            || self.cwes.iter().any(|c| c.eq_ignore_ascii_case(term))
    }

    fn to_record(&self) -> VulnerabilityRecord {
        let ransomware = if self.known_ransomware_campaign_use == "Known" {
            Highlight::Strong
        } else {
            Highlight::Subtle
        };

        VulnerabilityRecord::new(&self.cve_id)
            .with_title(Some(self.vendor_project.as_str()))
            .with_extra("Product", FieldValue::Text(self.product.clone()))
            .with_extra(
                "Vulnerability Name",
                FieldValue::Text(self.vulnerability_name.clone()),
            )
            .with_extra("Date Added", FieldValue::Text(self.date_added.clone()))
            .with_extra(
                "Required Action",
                FieldValue::Text(self.required_action.clone()),
            )
            .with_extra("Due Date", FieldValue::Text(self.due_date.clone()))
            .with_extra(
                "Ransomware",
                FieldValue::Emphasized(self.known_ransomware_campaign_use.clone(), ransomware),
            )
            .with_extra("CWE", FieldValue::List(self.cwes.clone()))
            .with_extra(
                "Short Description",
                FieldValue::Block(self.short_description.clone()),
            )
            .with_extra("Notes", FieldValue::Block(self.notes.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct KevFeed {
    vulnerabilities: Vec<KevEntry>,
}

/// Filters the catalog for a CVE or CWE id.
///
/// The whole feed is downloaded on every search.
pub struct KevSource {
    client: Client,
    feed_url: String,
}

impl KevSource {
    /// Create a source against the public feed.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_feed_url(client, KEV_FEED_URL)
    }

    /// Create a source against another feed location.
    #[must_use]
    pub fn with_feed_url(client: Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }

    /// Catalog entries matching `term`, in feed order.
    pub async fn lookup(&self, term: &SearchTerm) -> Result<Vec<KevEntry>> {
        let value = fetch_json(self.client.get(&self.feed_url)).await?;
        let feed: KevFeed = decode(value, "Unexpected CISA feed structure.")?;
        debug!(entries = feed.vulnerabilities.len(), "KEV feed loaded");

        let matches: Vec<KevEntry> = feed
            .vulnerabilities
            .into_iter()
            .filter(|entry| entry.matches(term.as_str()))
            .collect();

        if matches.is_empty() {
            return Err(SourceError::NotFound);
        }
        Ok(matches)
    }
}

#[async_trait]
impl SourceAdapter for KevSource {
    fn source_id(&self) -> &'static str {
        "cisa-kev"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let result = self
            .lookup(term)
            .await
            .map(|entries| entries.iter().map(|e| e.to_record().to_node()).collect());
        section(title, KEV_NOT_DETECTED, result)
    }
}

//! Exploit prediction scores from the FIRST EPSS API.

use super::{section, CVE_NOT_DETECTED};
use crate::error::{Result, SourceError};
use crate::http::{decode, fetch_json, lenient_f64};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{
    Highlight, PriorityRank, ReportNode, ReportTree, SearchTerm, VulnerabilityRecord,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Public FIRST API root.
pub const FIRST_API_BASE_URL: &str = "https://api.first.org/";

/// One EPSS entry as returned by the API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EpssScore {
    /// CVE id the score belongs to
    pub cve: String,
    /// Score date
    #[serde(default)]
    pub date: Option<String>,
    /// Probability of exploitation in the next 30 days
    #[serde(deserialize_with = "lenient_f64")]
    pub epss: f64,
    /// Rank of `epss` among all scored CVEs
    #[serde(deserialize_with = "lenient_f64")]
    pub percentile: f64,
}

impl EpssScore {
    /// Patching priority for this score.
    #[must_use]
    pub fn priority(&self) -> PriorityRank {
        PriorityRank::classify(self.epss, self.percentile)
    }

    fn to_record(&self) -> VulnerabilityRecord {
        VulnerabilityRecord::new(&self.cve)
            .with_text("Date", self.date.clone())
            .with_score("EPSS Score", self.epss)
            .with_score("Percentile", self.percentile)
    }

    fn to_node(&self) -> ReportNode {
        let rank = self.priority();
        self.to_record()
            .to_node()
            .with_child(
                ReportNode::group("Summary").with_child(
                    ReportNode::field("Patching priority rank", rank.display_name())
                        .with_highlight(Highlight::Severity(rank.severity())),
                ),
            )
    }
}

#[derive(Debug, Deserialize)]
struct EpssResponse {
    #[serde(default)]
    data: Vec<EpssScore>,
}

/// Scores a CVE with EPSS and derives a patching priority.
pub struct EpssSource {
    client: Client,
    base_url: String,
}

impl EpssSource {
    /// Create a source against the public API.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, FIRST_API_BASE_URL)
    }

    /// Create a source against another API root.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch every score the API returns for `term`.
    pub async fn lookup(&self, term: &SearchTerm) -> Result<Vec<EpssScore>> {
        let url = format!("{}/data/v1/epss", self.base_url.trim_end_matches('/'));
        debug!(%url, term = term.as_str(), "fetching EPSS scores");

        let value = fetch_json(self.client.get(&url).query(&[("cve", term.as_str())])).await?;
        let response: EpssResponse = decode(value, "Unexpected EPSS response.")?;

        if response.data.is_empty() {
            return Err(SourceError::NotFound);
        }
        Ok(response.data)
    }
}

#[async_trait]
impl SourceAdapter for EpssSource {
    fn source_id(&self) -> &'static str {
        "epss"
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        let result = self
            .lookup(term)
            .await
            .map(|scores| scores.iter().map(EpssScore::to_node).collect());
        section(title, CVE_NOT_DETECTED, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_accepts_string_numbers() {
        let response: EpssResponse = decode(
            json!({
                "status": "OK",
                "data": [
                    {
                        "cve": "CVE-2021-44228",
                        "epss": "0.974240000",
                        "percentile": "0.999850000",
                        "date": "2024-06-01"
                    }
                ]
            }),
            "bad",
        )
        .expect("decodes");

        let score = &response.data[0];
        assert!((score.epss - 0.97424).abs() < 1e-12);
        assert_eq!(score.priority(), PriorityRank::Critical);
    }

    #[test]
    fn test_empty_data_defaults() {
        let response: EpssResponse = decode(json!({"status": "OK"}), "bad").expect("decodes");
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_node_carries_summary() {
        let score = EpssScore {
            cve: "CVE-2023-0001".to_string(),
            date: Some("2024-06-01".to_string()),
            epss: 0.5,
            percentile: 0.5,
        };
        let node = score.to_node();

        assert_eq!(node.label(), "CVE-2023-0001");
        assert_eq!(node.field_value("Date"), Some("2024-06-01"));
        assert_eq!(node.field_value("EPSS Score"), Some("0.5"));

        let labels: Vec<&str> = node.children().iter().map(ReportNode::label).collect();
        assert_eq!(labels, vec!["Date", "EPSS Score", "Percentile", "Summary"]);

        let summary = node.child("Summary").expect("summary group");
        let rank = &summary.children()[0];
        assert_eq!(rank.label(), "Patching priority rank");
        assert_eq!(rank.value(), Some("Medium"));
    }

    #[test]
    fn test_scores_are_numeric_metrics() {
        let score = EpssScore {
            cve: "CVE-2021-44228".to_string(),
            date: None,
            epss: 0.94424,
            percentile: 0.99985,
        };
        let record = score.to_record();

        assert_eq!(record.score("EPSS Score"), Some(0.94424));
        assert_eq!(record.score("Percentile"), Some(0.99985));
        assert!(record.extra("EPSS Score").is_none());
    }
}

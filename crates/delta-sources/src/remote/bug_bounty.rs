//! Bug-bounty activity from the HackerOne GraphQL API.
//!
//! One endpoint serves three lookups. [`BountyQuery`] selects the operation,
//! and each operation owns its payload, headers, and normalization.

use super::{collapse_paragraphs, section, CVE_NOT_DETECTED};
use crate::error::{Result, SourceError};
use crate::http::{decode, fetch_json};
use crate::source::SourceAdapter;
use async_trait::async_trait;
use delta_core::{
    FieldValue, Highlight, ReportNode, ReportTree, SearchTerm, Severity, VulnerabilityRecord,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Public GraphQL endpoint.
pub const HACKERONE_GRAPHQL_URL: &str = "https://hackerone.com/graphql";

const PAGE_SIZE: u32 = 25;
const CWE_NOT_DETECTED: &str = "CWE not detected";
const UNEXPECTED_RESPONSE: &str = "Unexpected HackerOne response.";

const CWE_ENTRIES_QUERY: &str = r"
query CweEntriesQuery($first: Int, $search: String, $offset: Int) {
  cwe_entries(
    order_by: {field: submission_count, direction: DESC}
    first: $first
    search: $search
    offset: $offset
  ) {
    edges {
      node {
        id
        cwe_id
        cwe_name
        submission_count
        submission_count_trailing_12_weeks
      }
    }
    total_count
  }
}
";

const RANKED_CVE_QUERY: &str = r"
query CveDataQuery($first: Int, $search: String, $offset: Int, $orderBy: AnalyticsOrderByInputType) {
  ranked_cve_entries(
    first: $first
    search: $search
    offset: $offset
    order_by: $orderBy
  ) {
    total_count
    edges {
      node {
        id
        cve_id
        cve_description
        rank
        reports_submitted_count
        products
        vendors
        epss
      }
    }
  }
}
";

const CVE_DETAIL_QUERY: &str = r"
query CveDiscoveryDetailedViewCveEntry($cve_id: String!) {
  cve_entry(cve_id: $cve_id) {
    rank
    reports_submitted_count
    severity_count_unknown
    severity_count_none
    severity_count_low
    severity_count_medium
    severity_count_high
    severity_count_critical
    __typename
  }
}
";

/// Which HackerOne lookup a source performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BountyQuery {
    /// Weaknesses ordered by submission count
    CweEntries,
    /// CVEs ordered by HackerOne rank
    RankedCves,
    /// Report activity for one CVE
    CveDetail,
}

impl BountyQuery {
    fn source_id(self) -> &'static str {
        match self {
            Self::CweEntries => "hackerone-cwe",
            Self::RankedCves => "hackerone-cve",
            Self::CveDetail => "hackerone-activity",
        }
    }

    fn not_detected(self) -> &'static str {
        match self {
            Self::CweEntries => CWE_NOT_DETECTED,
            Self::RankedCves | Self::CveDetail => CVE_NOT_DETECTED,
        }
    }

    fn product_feature(self) -> &'static str {
        match self {
            Self::CweEntries => "cwe_discovery",
            Self::RankedCves | Self::CveDetail => "cve_discovery",
        }
    }

    /// GraphQL request body for `term`.
    #[must_use]
    pub fn payload(self, term: &str) -> Value {
        match self {
            Self::CweEntries => json!({
                "query": CWE_ENTRIES_QUERY,
                "variables": {"first": PAGE_SIZE, "offset": 0, "search": term},
            }),
            Self::RankedCves => json!({
                "query": RANKED_CVE_QUERY,
                "variables": {
                    "first": PAGE_SIZE,
                    "offset": 0,
                    "search": term,
                    "orderBy": {"key": "rank", "direction": "asc"},
                },
            }),
            Self::CveDetail => json!({
                "operationName": "CveDiscoveryDetailedViewCveEntry",
                "query": CVE_DETAIL_QUERY,
                "variables": {"cve_id": term},
            }),
        }
    }

    /// Normalize a decoded response body into record nodes.
    pub fn parse(self, term: &str, body: Value) -> Result<Vec<ReportNode>> {
        match self {
            Self::CweEntries => {
                let data: CweData = graphql_data(body)?;
                Ok(data.cwe_entries.edges.into_iter().map(|e| e.node.to_node()).collect())
            }
            Self::RankedCves => {
                let data: RankedCveData = graphql_data(body)?;
                Ok(data
                    .ranked_cve_entries
                    .edges
                    .into_iter()
                    .map(|e| e.node.to_node())
                    .collect())
            }
            Self::CveDetail => {
                let data: CveDetailData = graphql_data(body)?;
                Ok(data
                    .cve_entry
                    .map(|entry| entry.to_node(term))
                    .into_iter()
                    .collect())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Unwrap the `data` member, surfacing GraphQL errors.
fn graphql_data<T: DeserializeOwned>(body: Value) -> Result<T> {
    let response: GraphQlResponse<T> = decode(body, UNEXPECTED_RESPONSE)?;
    if let Some(error) = response.errors.into_iter().next() {
        return Err(SourceError::SchemaMismatch(format!(
            "GraphQL error: {}",
            error.message
        )));
    }
    response
        .data
        .ok_or_else(|| SourceError::SchemaMismatch(UNEXPECTED_RESPONSE.to_string()))
}

#[derive(Debug, Deserialize)]
struct Connection<N> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<N>>,
}

#[derive(Debug, Deserialize)]
struct Edge<N> {
    node: N,
}

#[derive(Debug, Deserialize)]
struct CweData {
    cwe_entries: Connection<CweEntry>,
}

#[derive(Debug, Deserialize)]
struct CweEntry {
    cwe_id: String,
    #[serde(default)]
    cwe_name: Option<String>,
    #[serde(default)]
    submission_count: Option<u64>,
    #[serde(default)]
    submission_count_trailing_12_weeks: Option<u64>,
}

impl CweEntry {
    fn to_node(&self) -> ReportNode {
        let submissions = ReportNode::group("Submission")
            .with_child(ReportNode::field("Count", count(self.submission_count)))
            .with_child(ReportNode::field(
                "12 Weeks",
                count(self.submission_count_trailing_12_weeks),
            ));

        VulnerabilityRecord::new(&self.cwe_id)
            .with_title(self.cwe_name.clone())
            .to_node()
            .with_child(submissions)
    }
}

#[derive(Debug, Deserialize)]
struct RankedCveData {
    ranked_cve_entries: Connection<RankedCve>,
}

#[derive(Debug, Deserialize)]
struct RankedCve {
    cve_id: String,
    #[serde(default)]
    cve_description: Option<String>,
    #[serde(default)]
    rank: Option<f64>,
    #[serde(default)]
    reports_submitted_count: Option<u64>,
    #[serde(default)]
    products: Option<Vec<String>>,
    #[serde(default)]
    vendors: Option<Vec<String>>,
    #[serde(default)]
    epss: Option<f64>,
}

impl RankedCve {
    fn to_node(&self) -> ReportNode {
        let description = self
            .cve_description
            .as_deref()
            .map(collapse_paragraphs)
            .unwrap_or_default();

        let mut record = VulnerabilityRecord::new(&self.cve_id);
        if let Some(rank) = self.rank {
            record = record.with_score("Rank", rank);
        }
        if let Some(epss) = self.epss {
            record = record.with_score("EPSS", epss);
        }

        record
            .with_text("Reports", self.reports_submitted_count.map(|r| r.to_string()))
            .with_extra("Vendors", FieldValue::List(self.vendors.clone().unwrap_or_default()))
            .with_extra("Description", FieldValue::Block(description))
            .with_extra("Products", FieldValue::List(self.products.clone().unwrap_or_default()))
            .to_node()
    }
}

#[derive(Debug, Deserialize)]
struct CveDetailData {
    cve_entry: Option<CveActivity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CveActivity {
    rank: Option<f64>,
    reports_submitted_count: Option<u64>,
    severity_count_unknown: Option<u64>,
    severity_count_none: Option<u64>,
    severity_count_low: Option<u64>,
    severity_count_medium: Option<u64>,
    severity_count_high: Option<u64>,
    severity_count_critical: Option<u64>,
}

impl CveActivity {
    fn to_node(&self, term: &str) -> ReportNode {
        let levels = [
            ("Unknown", self.severity_count_unknown, Highlight::Subtle),
            ("None", self.severity_count_none, Highlight::Subtle),
            ("Low", self.severity_count_low, Highlight::Severity(Severity::Low)),
            ("Medium", self.severity_count_medium, Highlight::Severity(Severity::Medium)),
            ("High", self.severity_count_high, Highlight::Severity(Severity::High)),
            (
                "Critical",
                self.severity_count_critical,
                Highlight::Severity(Severity::Critical),
            ),
        ];
        let severity = levels
            .into_iter()
            .fold(ReportNode::group("Severity"), |group, (name, n, highlight)| {
                group.with_child(ReportNode::field(name, count(n)).with_highlight(highlight))
            });

        ReportNode::record(term)
            .with_child(ReportNode::field(
                "Rank",
                self.rank.map_or_else(|| "-".to_string(), |r| r.to_string()),
            ))
            .with_child(ReportNode::field("Reports", count(self.reports_submitted_count)))
            .with_child(severity)
    }
}

fn count(n: Option<u64>) -> String {
    n.map_or_else(|| "-".to_string(), |n| n.to_string())
}

/// One HackerOne lookup exposed as a report section.
pub struct BugBountySource {
    client: Client,
    endpoint: String,
    query: BountyQuery,
}

impl BugBountySource {
    /// Create a source against the public endpoint.
    #[must_use]
    pub fn new(client: Client, query: BountyQuery) -> Self {
        Self::with_endpoint(client, query, HACKERONE_GRAPHQL_URL)
    }

    /// Create a source against another GraphQL endpoint.
    #[must_use]
    pub fn with_endpoint(client: Client, query: BountyQuery, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            query,
        }
    }

    /// Run the operation for `term`.
    pub async fn lookup(&self, term: &SearchTerm) -> Result<Vec<ReportNode>> {
        debug!(
            endpoint = %self.endpoint,
            operation = ?self.query,
            term = term.as_str(),
            "querying HackerOne"
        );

        let request = self
            .client
            .post(&self.endpoint)
            .header("accept", "*/*")
            .header("origin", "https://hackerone.com")
            .header("x-product-area", "hacktivity")
            .header("x-product-feature", self.query.product_feature())
            .json(&self.query.payload(term.as_str()));

        let body = fetch_json(request).await?;
        let nodes = self.query.parse(term.as_str(), body)?;
        if nodes.is_empty() {
            return Err(SourceError::NotFound);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl SourceAdapter for BugBountySource {
    fn source_id(&self) -> &'static str {
        self.query.source_id()
    }

    async fn search(&self, term: &SearchTerm, title: &str) -> ReportTree {
        section(title, self.query.not_detected(), self.lookup(term).await)
    }
}

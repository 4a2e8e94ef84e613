//! Shared types used across the Delta application.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::DeltaError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user search term: a CVE id, a CWE id, or free text.
///
/// Surrounding whitespace is trimmed; the term is otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// Create a new `SearchTerm`.
    ///
    /// # Errors
    /// Returns error if the term is empty after trimming.
    pub fn new(term: impl Into<String>) -> Result<Self, DeltaError> {
        let term = term.into();
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Err(DeltaError::Validation(
                "search term must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the term as a CVE identifier.
    pub fn as_cve(&self) -> Result<CveId, DeltaError> {
        CveId::parse(&self.0)
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A CVE identifier split into year and sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CveId {
    canonical: String,
    year: String,
    sequence: u64,
}

impl CveId {
    /// Parse a CVE identifier, case-insensitively.
    ///
    /// The id must split into exactly three hyphen-separated parts with the
    /// third one numeric.
    ///
    /// # Errors
    /// Returns `DeltaError::MalformedIdentifier` otherwise.
    pub fn parse(raw: &str) -> Result<Self, DeltaError> {
        let canonical = raw.trim().to_uppercase();
        let parts: Vec<&str> = canonical.split('-').collect();

        let [_, year, sequence] = parts.as_slice() else {
            return Err(DeltaError::MalformedIdentifier(raw.to_string()));
        };

        if year.is_empty() {
            return Err(DeltaError::MalformedIdentifier(raw.to_string()));
        }

        let sequence = sequence
            .parse::<u64>()
            .map_err(|_| DeltaError::MalformedIdentifier(raw.to_string()))?;
        let year = (*year).to_string();

        Ok(Self {
            canonical,
            year,
            sequence,
        })
    }

    /// Uppercase canonical form, e.g. `CVE-2021-44228`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Year segment.
    #[must_use]
    pub fn year(&self) -> &str {
        &self.year
    }

    /// Sequence number segment.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Thousand-sized bucket the registry files the id under.
    #[must_use]
    pub fn bucket(&self) -> u64 {
        self.sequence / 1000
    }
}

impl fmt::Display for CveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

/// Normalized severity vocabulary.
///
/// Raw values outside the fixed vocabulary are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Critical
    Critical,
    /// High
    High,
    /// Medium
    Medium,
    /// Low
    Low,
    /// Unrecognized raw value, kept as written
    Other(String),
}

impl Severity {
    /// Normalize a raw severity string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" => Self::Low,
            "" => Self::Other("unknown".to_string()),
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    /// Lowercase display name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Patching priority derived from an EPSS score and percentile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityRank {
    /// Weighted score >= 0.8
    Critical,
    /// Weighted score >= 0.6
    High,
    /// Weighted score >= 0.4
    Medium,
    /// Anything lower
    Low,
}

impl PriorityRank {
    const EPSS_WEIGHT: f64 = 0.7;
    const PERCENTILE_WEIGHT: f64 = 0.3;
    /// Absorbs binary rounding so decimal boundaries land in the upper bucket.
    const TOLERANCE: f64 = 1e-9;

    /// Weighted score: `0.7 * epss + 0.3 * percentile`.
    #[must_use]
    pub fn weighted_score(epss: f64, percentile: f64) -> f64 {
        epss * Self::EPSS_WEIGHT + percentile * Self::PERCENTILE_WEIGHT
    }

    /// Classify an EPSS score/percentile pair. Lower bounds are inclusive.
    #[must_use]
    pub fn classify(epss: f64, percentile: f64) -> Self {
        let score = Self::weighted_score(epss, percentile);
        if score >= 0.8 - Self::TOLERANCE {
            Self::Critical
        } else if score >= 0.6 - Self::TOLERANCE {
            Self::High
        } else if score >= 0.4 - Self::TOLERANCE {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Matching severity for coloring.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Critical => Severity::Critical,
            Self::High => Severity::High,
            Self::Medium => Severity::Medium,
            Self::Low => Severity::Low,
        }
    }

    /// Title-case display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for PriorityRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_term_trims() {
        let term = SearchTerm::new("  log4j \n").expect("valid term");
        assert_eq!(term.as_str(), "log4j");
    }

    #[test]
    fn test_search_term_empty() {
        assert!(SearchTerm::new("   ").is_err());
        assert!(SearchTerm::new("").is_err());
    }

    #[test]
    fn test_cve_id_valid() {
        let id = CveId::parse("cve-2021-44228").expect("valid CVE id");
        assert_eq!(id.as_str(), "CVE-2021-44228");
        assert_eq!(id.year(), "2021");
        assert_eq!(id.sequence(), 44228);
        assert_eq!(id.bucket(), 44);
    }

    #[test]
    fn test_cve_id_small_bucket() {
        let id = CveId::parse("CVE-2014-0160").expect("valid CVE id");
        assert_eq!(id.bucket(), 0);
    }

    #[test]
    fn test_cve_id_invalid() {
        let invalid_ids = vec![
            "CVE-BAD",
            "CVE-2021",
            "CVE-2021-ABC",
            "CVE-2021-1-2",
            "log4j",
            "CVE--123",
            "",
        ];

        for id in invalid_ids {
            assert!(
                matches!(CveId::parse(id), Err(DeltaError::MalformedIdentifier(_))),
                "Should fail for: {id}"
            );
        }
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("critical"), Severity::Critical);
        assert_eq!(Severity::parse("HIGH"), Severity::High);
        assert_eq!(Severity::parse("Medium"), Severity::Medium);
        assert_eq!(Severity::parse("low"), Severity::Low);
        assert_eq!(Severity::parse("info"), Severity::Other("info".to_string()));
        assert_eq!(Severity::parse("info").to_string(), "info");
        assert_eq!(Severity::parse(""), Severity::Other("unknown".to_string()));
    }

    #[test]
    fn test_priority_rank_examples() {
        assert_eq!(PriorityRank::classify(0.9, 0.9), PriorityRank::Critical);
        assert_eq!(PriorityRank::classify(0.5, 0.5), PriorityRank::Medium);
        assert_eq!(PriorityRank::classify(0.0, 0.0), PriorityRank::Low);
        assert_eq!(PriorityRank::classify(0.1, 0.99), PriorityRank::Low);
    }

    #[test]
    fn test_priority_rank_boundaries_are_inclusive() {
        // Weighted sums land exactly on the thresholds
        assert_eq!(PriorityRank::classify(0.8, 0.8), PriorityRank::Critical);
        assert_eq!(PriorityRank::classify(0.6, 0.6), PriorityRank::High);
        assert_eq!(PriorityRank::classify(0.4, 0.4), PriorityRank::Medium);
        assert_eq!(PriorityRank::classify(1.0, 0.0), PriorityRank::High);

        // Just below each threshold
        assert_eq!(PriorityRank::classify(0.79, 0.79), PriorityRank::High);
        assert_eq!(PriorityRank::classify(0.59, 0.59), PriorityRank::Medium);
        assert_eq!(PriorityRank::classify(0.39, 0.39), PriorityRank::Low);
    }

    #[test]
    fn test_priority_rank_severity() {
        assert_eq!(PriorityRank::Critical.severity(), Severity::Critical);
        assert_eq!(PriorityRank::Low.to_string(), "Low");
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::High).expect("serialize severity");
        assert_eq!(json, "\"high\"");
    }
}

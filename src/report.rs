// src/report.rs
//! Selection results together with the criteria that produced them

use serde::Serialize;

use crate::filter::FilterCriteria;
use crate::types::Certificate;

/// Verbose payload returned by the request layer and the `--json` output
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    #[serde(rename = "CAID")]
    pub ca_id: i64,
    #[serde(rename = "ExcludeExpired")]
    pub exclude_expired: bool,
    #[serde(rename = "ExcludeRevoked")]
    pub exclude_revoked: bool,
    #[serde(rename = "OnlyLINTErrors")]
    pub only_lint_errors: bool,
    #[serde(rename = "ExcludePreCertificates")]
    pub exclude_precertificates: bool,
    #[serde(rename = "DaysToLookBack")]
    pub days_to_look_back: i32,
    #[serde(rename = "Results")]
    pub results: Vec<Certificate>,
}

impl SelectionReport {
    pub fn new(criteria: &FilterCriteria, results: Vec<Certificate>) -> Self {
        Self {
            ca_id: criteria.ca_id,
            exclude_expired: criteria.exclude_expired,
            exclude_revoked: criteria.exclude_revoked,
            only_lint_errors: criteria.only_lint_errors,
            exclude_precertificates: criteria.exclude_precertificates,
            days_to_look_back: criteria.days_to_look_back,
            results,
        }
    }

    /// One-line description used when verbose output is off
    pub fn summary(&self) -> String {
        format!(
            "Found CAID {} with {} certificates matching the conditions: \
             excludeExpired: {}, excludeRevoked: {}, onlyLINTErrors: {}, \
             excludePreCertificates: {}, daysToLookBack: {}",
            self.ca_id,
            self.results.len(),
            self.exclude_expired,
            self.exclude_revoked,
            self.only_lint_errors,
            self.exclude_precertificates,
            self.days_to_look_back
        )
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// src/aggregator.rs
//! Per-certificate fact derivation over raw certwatch records
//!
//! Mirrors the lateral joins of the certwatch query: a certificate only becomes a
//! candidate once it has been logged, while CRL and lint records are optional and
//! count as zero when missing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Certificate, CertificateType, CertificationAuthority};

/// Row of the `certificate` table, with the `x509_*` extractions already applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: i64,
    pub issuer_ca_id: i64,
    #[serde(with = "hex::serde")]
    pub serial_number: Vec<u8>,
    pub subject_distinguished_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// `x509_print` output, used only to spot the poison extension
    #[serde(default)]
    pub printable: String,
}

/// Row of `ct_log_entry`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryRecord {
    pub certificate_id: i64,
    pub entry_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ct_log_id: Option<i64>,
}

/// Row of `crl_revoked`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub ca_id: i64,
    #[serde(with = "hex::serde")]
    pub serial_number: Vec<u8>,
    #[serde(default)]
    pub revocation_date: Option<DateTime<Utc>>,
}

/// Row of `lint_cert_issue`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintIssueRecord {
    pub certificate_id: i64,
    #[serde(default)]
    pub lint_issue_id: Option<i64>,
}

/// Snapshot of the certwatch tables the monitor reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub cas: Vec<CertificationAuthority>,
    #[serde(default)]
    pub certificates: Vec<CertificateRecord>,
    #[serde(default)]
    pub ct_log_entries: Vec<LogEntryRecord>,
    #[serde(default)]
    pub crl_revoked: Vec<RevocationRecord>,
    #[serde(default)]
    pub lint_cert_issues: Vec<LintIssueRecord>,
}

/// Derive the facts of every logged certificate issued by `ca_id`, as of `now`.
///
/// Output follows the order of `dataset.certificates`; callers sort.
pub fn aggregate(dataset: &Dataset, ca_id: i64, now: DateTime<Utc>) -> Vec<Certificate> {
    let candidates: Vec<&CertificateRecord> = dataset
        .certificates
        .iter()
        .filter(|c| c.issuer_ca_id == ca_id)
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let first_seen = first_seen_by_certificate(&dataset.ct_log_entries);
    let revocations = revocations_by_serial(&dataset.crl_revoked, ca_id);
    let lint_errors = lint_errors_by_certificate(&dataset.lint_cert_issues);

    candidates
        .into_iter()
        .filter_map(|record| {
            // Required join: never logged means never reported
            let first_seen = *first_seen.get(&record.id)?;
            let revoked = revocations
                .get(record.serial_number.as_slice())
                .is_some_and(|count| *count > 0);

            Some(Certificate {
                certificate_id: record.id,
                serial_number: record.serial_number.clone(),
                subject_distinguished_name: record.subject_distinguished_name.clone(),
                certificate_type: CertificateType::classify(&record.printable),
                not_before: record.not_before,
                not_after: record.not_after,
                first_seen,
                revoked,
                expired: record.not_after < now,
                lint_errors: lint_errors.get(&record.id).copied().unwrap_or(0),
            })
        })
        .collect()
}

fn first_seen_by_certificate(entries: &[LogEntryRecord]) -> HashMap<i64, DateTime<Utc>> {
    let mut first_seen: HashMap<i64, DateTime<Utc>> = HashMap::new();
    for entry in entries {
        first_seen
            .entry(entry.certificate_id)
            .and_modify(|seen| {
                if entry.entry_timestamp < *seen {
                    *seen = entry.entry_timestamp;
                }
            })
            .or_insert(entry.entry_timestamp);
    }
    first_seen
}

fn revocations_by_serial(records: &[RevocationRecord], ca_id: i64) -> HashMap<&[u8], u64> {
    let mut counts: HashMap<&[u8], u64> = HashMap::new();
    for record in records.iter().filter(|r| r.ca_id == ca_id) {
        *counts.entry(record.serial_number.as_slice()).or_insert(0) += 1;
    }
    counts
}

fn lint_errors_by_certificate(issues: &[LintIssueRecord]) -> HashMap<i64, u64> {
    let mut counts: HashMap<i64, u64> = HashMap::new();
    for issue in issues {
        *counts.entry(issue.certificate_id).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const CA: i64 = 52410;
    const OTHER_CA: i64 = 1;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(id: i64, ca: i64, serial: &[u8]) -> CertificateRecord {
        CertificateRecord {
            id,
            issuer_ca_id: ca,
            serial_number: serial.to_vec(),
            subject_distinguished_name: format!("CN=host{}.example.com", id),
            not_before: now() - Duration::days(10),
            not_after: now() + Duration::days(355),
            printable: String::new(),
        }
    }

    fn logged(id: i64, days_ago: i64) -> LogEntryRecord {
        LogEntryRecord {
            certificate_id: id,
            entry_timestamp: now() - Duration::days(days_ago),
            ct_log_id: None,
        }
    }

    #[test]
    fn test_first_seen_is_earliest_entry() {
        let dataset = Dataset {
            certificates: vec![record(1, CA, &[1])],
            ct_log_entries: vec![logged(1, 2), logged(1, 5), logged(1, 3)],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());

        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].first_seen, now() - Duration::days(5));
    }

    #[test]
    fn test_unlogged_certificate_is_not_a_candidate() {
        let dataset = Dataset {
            certificates: vec![record(1, CA, &[1]), record(2, CA, &[2])],
            ct_log_entries: vec![logged(2, 1)],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());

        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].certificate_id, 2);
    }

    #[test]
    fn test_only_requested_issuer() {
        let dataset = Dataset {
            certificates: vec![record(1, CA, &[1]), record(2, OTHER_CA, &[2])],
            ct_log_entries: vec![logged(1, 1), logged(2, 1)],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0].certificate_id, 1);

        assert!(aggregate(&dataset, 999, now()).is_empty());
    }

    #[test]
    fn test_revoked_requires_same_ca_and_serial() {
        let dataset = Dataset {
            certificates: vec![record(1, CA, &[0xaa]), record(2, CA, &[0xbb])],
            ct_log_entries: vec![logged(1, 1), logged(2, 1)],
            crl_revoked: vec![
                RevocationRecord { ca_id: CA, serial_number: vec![0xaa], revocation_date: None },
                RevocationRecord { ca_id: CA, serial_number: vec![0xaa], revocation_date: None },
                // Same serial, different CA
                RevocationRecord { ca_id: OTHER_CA, serial_number: vec![0xbb], revocation_date: None },
            ],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());
        let by_id = |id: i64| certs.iter().find(|c| c.certificate_id == id).unwrap();

        assert!(by_id(1).revoked);
        assert!(!by_id(2).revoked);
    }

    #[test]
    fn test_lint_errors_counted_and_default_zero() {
        let dataset = Dataset {
            certificates: vec![record(1, CA, &[1]), record(2, CA, &[2])],
            ct_log_entries: vec![logged(1, 1), logged(2, 1)],
            lint_cert_issues: vec![
                LintIssueRecord { certificate_id: 1, lint_issue_id: Some(7) },
                LintIssueRecord { certificate_id: 1, lint_issue_id: Some(9) },
                LintIssueRecord { certificate_id: 1, lint_issue_id: None },
            ],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());
        let by_id = |id: i64| certs.iter().find(|c| c.certificate_id == id).unwrap();

        assert_eq!(by_id(1).lint_errors, 3);
        assert_eq!(by_id(2).lint_errors, 0);
    }

    #[test]
    fn test_expired_is_strict() {
        let mut at_now = record(1, CA, &[1]);
        at_now.not_after = now();
        let mut past = record(2, CA, &[2]);
        past.not_after = now() - Duration::seconds(1);

        let dataset = Dataset {
            certificates: vec![at_now, past],
            ct_log_entries: vec![logged(1, 1), logged(2, 1)],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());
        let by_id = |id: i64| certs.iter().find(|c| c.certificate_id == id).unwrap();

        assert!(!by_id(1).expired);
        assert!(by_id(2).expired);
    }

    #[test]
    fn test_precertificate_classification() {
        let mut precert = record(1, CA, &[1]);
        precert.printable = "CT Precertificate Poison: critical".to_string();

        let dataset = Dataset {
            certificates: vec![precert, record(2, CA, &[2])],
            ct_log_entries: vec![logged(1, 1), logged(2, 1)],
            ..Default::default()
        };

        let certs = aggregate(&dataset, CA, now());

        assert_eq!(certs[0].certificate_type, CertificateType::Precertificate);
        assert_eq!(certs[1].certificate_type, CertificateType::Certificate);
    }

    #[test]
    fn test_deserialize_dataset() {
        let json = r#"{
            "certificates": [{
                "id": 5,
                "issuer_ca_id": 52410,
                "serial_number": "0a1bff",
                "subject_distinguished_name": "CN=a.example",
                "not_before": "2024-01-01T00:00:00Z",
                "not_after": "2025-01-01T00:00:00Z"
            }],
            "ct_log_entries": [
                { "certificate_id": 5, "entry_timestamp": "2024-01-01T00:10:00Z" }
            ]
        }"#;

        let dataset: Dataset = serde_json::from_str(json).unwrap();

        assert_eq!(dataset.certificates[0].serial_number, vec![0x0a, 0x1b, 0xff]);
        assert!(dataset.certificates[0].printable.is_empty());
        assert!(dataset.crl_revoked.is_empty());
        assert!(dataset.cas.is_empty());
    }
}

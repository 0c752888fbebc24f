// src/database/mapping.rs
//! Declared correspondence between result-set labels and certificate fields
//!
//! Labels are resolved once per statement into a [`ColumnMap`]; rows are then read
//! by index. Whether `FIRST_SEEN` and `first_seen` count as `FirstSeen` is decided
//! by a process-wide switch that is set once at startup.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::MonitorError;

/// Every field a certificate row must provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateField {
    CertificateId,
    SerialNumber,
    SubjectDistinguishedName,
    CertificateType,
    NotBefore,
    NotAfter,
    FirstSeen,
    Revoked,
    LintErrors,
    Expired,
}

impl CertificateField {
    pub const ALL: [CertificateField; 10] = [
        CertificateField::CertificateId,
        CertificateField::SerialNumber,
        CertificateField::SubjectDistinguishedName,
        CertificateField::CertificateType,
        CertificateField::NotBefore,
        CertificateField::NotAfter,
        CertificateField::FirstSeen,
        CertificateField::Revoked,
        CertificateField::LintErrors,
        CertificateField::Expired,
    ];

    /// Entity-side name
    pub fn name(&self) -> &'static str {
        match self {
            CertificateField::CertificateId => "CertificateID",
            CertificateField::SerialNumber => "SerialNumber",
            CertificateField::SubjectDistinguishedName => "SubjectDistinguishedName",
            CertificateField::CertificateType => "CertificateType",
            CertificateField::NotBefore => "NotBefore",
            CertificateField::NotAfter => "NotAfter",
            CertificateField::FirstSeen => "FirstSeen",
            CertificateField::Revoked => "Revoked",
            CertificateField::LintErrors => "LintErrors",
            CertificateField::Expired => "Expired",
        }
    }

    /// Column alias used by the certwatch statement
    pub fn column(&self) -> &'static str {
        match self {
            CertificateField::CertificateId => "CERTIFICATE_ID",
            CertificateField::SerialNumber => "SERIAL_NUMBER",
            CertificateField::SubjectDistinguishedName => "SUBJECT_DISTINGUISHED_NAME",
            CertificateField::CertificateType => "CERTIFICATE_TYPE",
            CertificateField::NotBefore => "NOT_BEFORE",
            CertificateField::NotAfter => "NOT_AFTER",
            CertificateField::FirstSeen => "FIRST_SEEN",
            CertificateField::Revoked => "REVOKED",
            CertificateField::LintErrors => "LINT_ERRORS",
            CertificateField::Expired => "EXPIRED",
        }
    }

    fn position(&self) -> usize {
        CertificateField::ALL
            .iter()
            .position(|f| f == self)
            .unwrap_or_default()
    }
}

/// How result-set labels are compared with field names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatching {
    /// Label must equal the entity name or the column alias verbatim
    Exact,
    /// Case, `_`, `-` and spaces are ignored
    CaseInsensitive,
}

static LABEL_MATCHING: OnceLock<LabelMatching> = OnceLock::new();

lazy_static! {
    static ref NORMALIZED_FIELDS: HashMap<String, CertificateField> = {
        let mut table = HashMap::new();
        for field in CertificateField::ALL {
            table.insert(normalize_label(field.name()), field);
            table.insert(normalize_label(field.column()), field);
        }
        table
    };
}

/// Set the process-wide matching mode.
///
/// Only the first call has an effect; returns false if the mode was already fixed.
pub fn configure_label_matching(mode: LabelMatching) -> bool {
    LABEL_MATCHING.set(mode).is_ok()
}

/// Active matching mode, case-insensitive unless configured otherwise
pub fn label_matching() -> LabelMatching {
    *LABEL_MATCHING.get_or_init(|| LabelMatching::CaseInsensitive)
}

/// Lower-case a label and strip separators
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the field a label refers to
pub fn resolve_label(label: &str, mode: LabelMatching) -> Option<CertificateField> {
    match mode {
        LabelMatching::Exact => CertificateField::ALL
            .into_iter()
            .find(|f| f.name() == label || f.column() == label),
        LabelMatching::CaseInsensitive => NORMALIZED_FIELDS.get(&normalize_label(label)).copied(),
    }
}

/// Column index of every certificate field in one result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [usize; 10],
}

impl ColumnMap {
    /// Resolve a statement's labels using the process-wide mode
    pub fn resolve<'a, I>(labels: I) -> Result<Self, MonitorError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::resolve_with(labels, label_matching())
    }

    /// Resolve a statement's labels. Unknown labels are ignored; a field without a
    /// label is a mapping failure.
    pub fn resolve_with<'a, I>(labels: I, mode: LabelMatching) -> Result<Self, MonitorError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found: [Option<usize>; 10] = [None; 10];

        for (index, label) in labels.into_iter().enumerate() {
            if let Some(field) = resolve_label(label, mode) {
                let slot = &mut found[field.position()];
                if slot.is_some() {
                    return Err(MonitorError::mapping(
                        field.name(),
                        format!("label '{}' maps to a field that is already bound", label),
                    ));
                }
                *slot = Some(index);
            }
        }

        let mut indices = [0usize; 10];
        for field in CertificateField::ALL {
            indices[field.position()] = found[field.position()].ok_or_else(|| {
                MonitorError::mapping(field.name(), "no matching column in result set")
            })?;
        }

        Ok(Self { indices })
    }

    pub fn index(&self, field: CertificateField) -> usize {
        self.indices[field.position()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: [&str; 10] = [
        "certificate_id",
        "serial_number",
        "subject_distinguished_name",
        "certificate_type",
        "not_before",
        "not_after",
        "first_seen",
        "revoked",
        "lint_errors",
        "expired",
    ];

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("FIRST_SEEN"), "firstseen");
        assert_eq!(normalize_label("FirstSeen"), "firstseen");
        assert_eq!(normalize_label("first-seen"), "firstseen");
        assert_eq!(normalize_label("First Seen"), "firstseen");
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let mode = LabelMatching::CaseInsensitive;
        assert_eq!(resolve_label("FIRST_SEEN", mode), Some(CertificateField::FirstSeen));
        assert_eq!(resolve_label("first_seen", mode), Some(CertificateField::FirstSeen));
        assert_eq!(resolve_label("FirstSeen", mode), Some(CertificateField::FirstSeen));
        assert_eq!(resolve_label("CertificateID", mode), Some(CertificateField::CertificateId));
        assert_eq!(resolve_label("lint_errors", mode), Some(CertificateField::LintErrors));
        assert_eq!(resolve_label("issuer_ca_id", mode), None);
    }

    #[test]
    fn test_resolve_exact() {
        let mode = LabelMatching::Exact;
        assert_eq!(resolve_label("FIRST_SEEN", mode), Some(CertificateField::FirstSeen));
        assert_eq!(resolve_label("FirstSeen", mode), Some(CertificateField::FirstSeen));
        assert_eq!(resolve_label("first_seen", mode), None);
    }

    #[test]
    fn test_column_map_from_postgres_labels() {
        let map = ColumnMap::resolve_with(COLUMNS, LabelMatching::CaseInsensitive).unwrap();

        assert_eq!(map.index(CertificateField::CertificateId), 0);
        assert_eq!(map.index(CertificateField::FirstSeen), 6);
        assert_eq!(map.index(CertificateField::Expired), 9);
    }

    #[test]
    fn test_column_map_ignores_unknown_labels() {
        let mut labels = vec!["issuer_ca_id"];
        labels.extend(COLUMNS.iter().rev());

        let map = ColumnMap::resolve_with(labels, LabelMatching::CaseInsensitive).unwrap();

        assert_eq!(map.index(CertificateField::Expired), 1);
        assert_eq!(map.index(CertificateField::CertificateId), 10);
    }

    #[test]
    fn test_column_map_missing_field() {
        let labels = COLUMNS.iter().copied().filter(|l| *l != "first_seen");

        let err = ColumnMap::resolve_with(labels, LabelMatching::CaseInsensitive).unwrap_err();

        match err {
            MonitorError::MappingFailure { field, .. } => assert_eq!(field, "FirstSeen"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_map_exact_rejects_lowercase() {
        assert!(ColumnMap::resolve_with(COLUMNS, LabelMatching::Exact).is_err());
    }

    #[test]
    fn test_column_map_duplicate_binding() {
        let mut labels = COLUMNS.to_vec();
        labels.push("FirstSeen");

        assert!(ColumnMap::resolve_with(labels, LabelMatching::CaseInsensitive).is_err());
    }
}

// src/filter.rs
//! Filter criteria and the predicates they compose into

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Certificate, CertificateType};

pub const DEFAULT_DAYS_TO_LOOK_BACK: i32 = 7;

/// What the caller wants to see from one CA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub ca_id: i64,
    pub exclude_revoked: bool,
    pub exclude_expired: bool,
    pub only_lint_errors: bool,
    pub exclude_precertificates: bool,
    pub days_to_look_back: i32,
}

impl FilterCriteria {
    /// Criteria for `ca_id` with every other field at its default
    pub fn for_ca(ca_id: i64) -> Self {
        Self {
            ca_id,
            exclude_revoked: false,
            exclude_expired: true,
            only_lint_errors: false,
            exclude_precertificates: false,
            days_to_look_back: DEFAULT_DAYS_TO_LOOK_BACK,
        }
    }

    pub fn exclude_revoked(mut self, value: bool) -> Self {
        self.exclude_revoked = value;
        self
    }

    pub fn exclude_expired(mut self, value: bool) -> Self {
        self.exclude_expired = value;
        self
    }

    pub fn only_lint_errors(mut self, value: bool) -> Self {
        self.only_lint_errors = value;
        self
    }

    pub fn exclude_precertificates(mut self, value: bool) -> Self {
        self.exclude_precertificates = value;
        self
    }

    pub fn days_to_look_back(mut self, days: i32) -> Self {
        self.days_to_look_back = days;
        self
    }

    /// Build the conjunction requested by these criteria.
    ///
    /// Flags that are off contribute nothing; the look-back window is always present.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(5);

        if self.exclude_revoked {
            predicates.push(Predicate::NotRevoked);
        }

        if self.only_lint_errors {
            predicates.push(Predicate::HasLintErrors);
        }

        if self.exclude_expired {
            predicates.push(Predicate::NotExpired);
        }

        if self.exclude_precertificates {
            predicates.push(Predicate::NotPrecertificate);
        }

        predicates.push(Predicate::FirstSeenWithin {
            days: self.days_to_look_back,
        });

        predicates
    }
}

/// A single condition a certificate must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// No CRL entry for the certificate
    NotRevoked,
    /// At least one lint issue recorded
    HasLintErrors,
    /// `not_after` strictly after the evaluation instant
    NotExpired,
    /// Final certificates only
    NotPrecertificate,
    /// First seen strictly after `now - days`
    FirstSeenWithin { days: i32 },
}

impl Predicate {
    pub fn matches(&self, cert: &Certificate, now: DateTime<Utc>) -> bool {
        match *self {
            Predicate::NotRevoked => !cert.revoked,
            Predicate::HasLintErrors => cert.lint_errors > 0,
            Predicate::NotExpired => cert.not_after > now,
            Predicate::NotPrecertificate => cert.certificate_type != CertificateType::Precertificate,
            Predicate::FirstSeenWithin { days } => cert.first_seen > lookback_cutoff(now, days),
        }
    }
}

/// `now - days`, saturated to the representable range.
///
/// A window too wide to represent starts at the earliest instant; a negative one too
/// far in the future starts at the latest, so it keeps nothing.
pub fn lookback_cutoff(now: DateTime<Utc>, days: i32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(if days >= 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// True when `cert` satisfies every predicate
pub fn matches_all(predicates: &[Predicate], cert: &Certificate, now: DateTime<Utc>) -> bool {
    predicates.iter().all(|p| p.matches(cert, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn cert() -> Certificate {
        Certificate {
            certificate_id: 10,
            serial_number: vec![1, 2, 3],
            subject_distinguished_name: "CN=test.example".to_string(),
            certificate_type: CertificateType::Certificate,
            not_before: now() - Duration::days(30),
            not_after: now() + Duration::days(300),
            first_seen: now() - Duration::days(2),
            revoked: false,
            expired: false,
            lint_errors: 0,
        }
    }

    #[test]
    fn test_default_criteria() {
        let criteria = FilterCriteria::for_ca(52410);

        assert_eq!(criteria.ca_id, 52410);
        assert!(!criteria.exclude_revoked);
        assert!(criteria.exclude_expired);
        assert!(!criteria.only_lint_errors);
        assert!(!criteria.exclude_precertificates);
        assert_eq!(criteria.days_to_look_back, 7);
    }

    #[test]
    fn test_default_predicates() {
        let predicates = FilterCriteria::for_ca(1).predicates();
        assert_eq!(
            predicates,
            vec![Predicate::NotExpired, Predicate::FirstSeenWithin { days: 7 }]
        );
    }

    #[test]
    fn test_all_flags_predicates() {
        let predicates = FilterCriteria::for_ca(1)
            .exclude_revoked(true)
            .only_lint_errors(true)
            .exclude_precertificates(true)
            .days_to_look_back(90)
            .predicates();

        assert_eq!(
            predicates,
            vec![
                Predicate::NotRevoked,
                Predicate::HasLintErrors,
                Predicate::NotExpired,
                Predicate::NotPrecertificate,
                Predicate::FirstSeenWithin { days: 90 },
            ]
        );
    }

    #[test]
    fn test_only_window_when_everything_off() {
        let predicates = FilterCriteria::for_ca(1).exclude_expired(false).predicates();
        assert_eq!(predicates, vec![Predicate::FirstSeenWithin { days: 7 }]);
    }

    #[test]
    fn test_not_revoked() {
        assert!(Predicate::NotRevoked.matches(&cert(), now()));
        let revoked = Certificate { revoked: true, ..cert() };
        assert!(!Predicate::NotRevoked.matches(&revoked, now()));
    }

    #[test]
    fn test_has_lint_errors() {
        assert!(!Predicate::HasLintErrors.matches(&cert(), now()));
        let linted = Certificate { lint_errors: 1, ..cert() };
        assert!(Predicate::HasLintErrors.matches(&linted, now()));
    }

    #[test]
    fn test_not_expired_boundary() {
        let at_now = Certificate { not_after: now(), ..cert() };
        assert!(!Predicate::NotExpired.matches(&at_now, now()));

        let later = Certificate { not_after: now() + Duration::seconds(1), ..cert() };
        assert!(Predicate::NotExpired.matches(&later, now()));
    }

    #[test]
    fn test_not_precertificate() {
        let precert = Certificate {
            certificate_type: CertificateType::Precertificate,
            ..cert()
        };
        assert!(!Predicate::NotPrecertificate.matches(&precert, now()));
        assert!(Predicate::NotPrecertificate.matches(&cert(), now()));
    }

    #[test]
    fn test_first_seen_window_is_exclusive() {
        let window = Predicate::FirstSeenWithin { days: 7 };

        let on_cutoff = Certificate { first_seen: now() - Duration::days(7), ..cert() };
        assert!(!window.matches(&on_cutoff, now()));

        let inside = Certificate {
            first_seen: now() - Duration::days(7) + Duration::seconds(1),
            ..cert()
        };
        assert!(window.matches(&inside, now()));
    }

    #[test]
    fn test_negative_lookback_excludes_past() {
        let window = Predicate::FirstSeenWithin { days: -1 };
        assert!(!window.matches(&cert(), now()));
    }

    #[test]
    fn test_unrepresentable_cutoff_saturates() {
        assert_eq!(lookback_cutoff(now(), i32::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(lookback_cutoff(now(), i32::MIN), DateTime::<Utc>::MAX_UTC);
        assert_eq!(lookback_cutoff(now(), 7), now() - Duration::days(7));

        let widest = Predicate::FirstSeenWithin { days: i32::MAX };
        assert!(widest.matches(&cert(), now()));
    }

    #[test]
    fn test_huge_negative_lookback_keeps_nothing() {
        let just_seen = Certificate { first_seen: now() - Duration::hours(1), ..cert() };

        for days in [-1, -100_000_000, i32::MIN] {
            let window = Predicate::FirstSeenWithin { days };
            assert!(!window.matches(&just_seen, now()), "days = {}", days);
        }
    }

    #[test]
    fn test_cutoff_never_moves_forward_as_window_widens() {
        let windows = [i32::MIN, -100_000_000, -1, 0, 1, 7, 3650, 100_000_000, i32::MAX];
        for pair in windows.windows(2) {
            assert!(lookback_cutoff(now(), pair[0]) >= lookback_cutoff(now(), pair[1]));
        }
    }

    #[test]
    fn test_matches_all() {
        let predicates = FilterCriteria::for_ca(1)
            .exclude_revoked(true)
            .only_lint_errors(true)
            .predicates();

        let linted = Certificate { lint_errors: 3, ..cert() };
        assert!(matches_all(&predicates, &linted, now()));

        let linted_revoked = Certificate { revoked: true, ..linted.clone() };
        assert!(!matches_all(&predicates, &linted_revoked, now()));

        assert!(matches_all(&[], &cert(), now()));
    }
}

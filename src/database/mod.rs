// src/database/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MonitorError;
use crate::filter::Predicate;
use crate::types::{Certificate, CertificationAuthority};

pub mod dataset;
pub mod mapping;
pub mod postgres;

pub use dataset::DatasetSource;
pub use postgres::PostgresSource;

/// One fully composed selection, ready to run against a source
#[derive(Debug, Clone)]
pub struct CertificateQuery {
    /// Issuing CA; always a hard filter
    pub ca_id: i64,
    /// Conjunction of optional conditions
    pub predicates: Vec<Predicate>,
    /// Instant used for expiry and the look-back window
    pub now: DateTime<Utc>,
}

/// Read access to certwatch data
#[async_trait]
pub trait CertificateSource: Send + Sync {
    /// Certificates of `query.ca_id` satisfying every predicate, newest sighting first
    /// and ties ordered by ascending certificate ID
    async fn select(&self, query: &CertificateQuery) -> Result<Vec<Certificate>, MonitorError>;

    /// Look up a CA by id
    async fn certification_authority(
        &self,
        ca_id: i64,
    ) -> Result<Option<CertificationAuthority>, MonitorError>;

    /// Health check
    async fn ping(&self) -> Result<(), MonitorError>;

    /// Short name for logs
    fn describe(&self) -> &'static str;
}

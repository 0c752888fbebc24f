// src/monitor.rs
//! Entry point for certificate selection

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::database::{CertificateQuery, CertificateSource};
use crate::error::MonitorError;
use crate::filter::FilterCriteria;
use crate::metrics;
use crate::types::{Certificate, CertificationAuthority};

/// Runs selections against one certificate source.
///
/// Holds nothing between calls besides the source handle, so a single monitor can
/// serve concurrent requests.
#[derive(Clone)]
pub struct CertificateMonitor {
    source: Arc<dyn CertificateSource>,
}

impl CertificateMonitor {
    pub fn new(source: Arc<dyn CertificateSource>) -> Self {
        Self { source }
    }

    /// Certificates matching `criteria` as of now
    pub async fn select(&self, criteria: &FilterCriteria) -> Result<Vec<Certificate>, MonitorError> {
        self.select_at(criteria, Utc::now()).await
    }

    /// Certificates matching `criteria` as of `now`
    pub async fn select_at(
        &self,
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> Result<Vec<Certificate>, MonitorError> {
        let started = Instant::now();
        let result = self.run_select(criteria, now).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(certificates) => {
                metrics::record_selection("success", elapsed, certificates.len());
                info!(
                    ca_id = criteria.ca_id,
                    results = certificates.len(),
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "Selection completed"
                );
            }
            Err(e) => {
                metrics::record_selection(e.kind(), elapsed, 0);
                warn!(ca_id = criteria.ca_id, error = %e, "Selection failed");
            }
        }

        result
    }

    async fn run_select(
        &self,
        criteria: &FilterCriteria,
        now: DateTime<Utc>,
    ) -> Result<Vec<Certificate>, MonitorError> {
        validate_ca_id(criteria.ca_id)?;

        let query = CertificateQuery {
            ca_id: criteria.ca_id,
            predicates: criteria.predicates(),
            now,
        };

        debug!(
            ca_id = query.ca_id,
            source = self.source.describe(),
            "Selecting with predicates {:?}",
            query.predicates
        );

        self.source.select(&query).await
    }

    /// Look up the CA a selection would run against
    pub async fn certification_authority(
        &self,
        ca_id: i64,
    ) -> Result<Option<CertificationAuthority>, MonitorError> {
        validate_ca_id(ca_id)?;
        self.source.certification_authority(ca_id).await
    }
}

fn validate_ca_id(ca_id: i64) -> Result<(), MonitorError> {
    if ca_id <= 0 {
        return Err(MonitorError::invalid_argument(
            "ca_id",
            format!("must be a positive integer, got {}", ca_id),
        ));
    }
    Ok(())
}

// src/database/dataset.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use super::{CertificateQuery, CertificateSource};
use crate::aggregator::{self, Dataset};
use crate::error::MonitorError;
use crate::filter;
use crate::types::{Certificate, CertificationAuthority};

/// Certificate source backed by an in-memory certwatch snapshot
///
/// Facts are derived by the aggregator on every call, so expiry always reflects the
/// query's own instant.
pub struct DatasetSource {
    dataset: Dataset,
}

impl DatasetSource {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    /// Load a JSON snapshot from disk
    pub async fn from_file(path: &Path) -> Result<Self> {
        info!("Loading certwatch dataset from {:?}", path);

        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dataset file {:?}", path))?;

        let dataset: Dataset = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse dataset file {:?}", path))?;

        info!(
            "Loaded dataset: {} CAs, {} certificates, {} log entries, {} CRL entries, {} lint issues",
            dataset.cas.len(),
            dataset.certificates.len(),
            dataset.ct_log_entries.len(),
            dataset.crl_revoked.len(),
            dataset.lint_cert_issues.len()
        );

        Ok(Self::new(dataset))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

#[async_trait]
impl CertificateSource for DatasetSource {
    async fn select(&self, query: &CertificateQuery) -> Result<Vec<Certificate>, MonitorError> {
        let candidates = aggregator::aggregate(&self.dataset, query.ca_id, query.now);
        let candidate_count = candidates.len();

        let mut selected: Vec<Certificate> = candidates
            .into_iter()
            .filter(|cert| filter::matches_all(&query.predicates, cert, query.now))
            .collect();
        selected.sort_by(Certificate::selection_order);

        debug!(
            "Dataset selection for CA {}: {} of {} candidates matched",
            query.ca_id,
            selected.len(),
            candidate_count
        );

        Ok(selected)
    }

    async fn certification_authority(
        &self,
        ca_id: i64,
    ) -> Result<Option<CertificationAuthority>, MonitorError> {
        Ok(self.dataset.cas.iter().find(|ca| ca.id == ca_id).cloned())
    }

    async fn ping(&self) -> Result<(), MonitorError> {
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "dataset"
    }
}

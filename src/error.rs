// src/error.rs
//! Error types for certificate selection

use thiserror::Error;

/// Failures surfaced by [`crate::monitor::CertificateMonitor`] and the data sources behind it.
///
/// Nothing here is retried or recovered from: every variant reaches the caller as produced.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The caller passed a value the engine cannot work with.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The underlying store failed (connectivity, timeout, query error).
    #[error("data source failure: {source}")]
    DataSourceFailure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A returned row does not fit the certificate shape.
    #[error("cannot map field `{field}`: {reason}")]
    MappingFailure { field: String, reason: String },
}

impl MonitorError {
    pub fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        MonitorError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub fn mapping(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::MappingFailure {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::InvalidArgument { .. } => "invalid_argument",
            MonitorError::DataSourceFailure { .. } => "data_source",
            MonitorError::MappingFailure { .. } => "mapping",
        }
    }

    /// Whether the failure was caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, MonitorError::InvalidArgument { .. })
    }
}

impl From<sqlx::Error> for MonitorError {
    fn from(source: sqlx::Error) -> Self {
        MonitorError::DataSourceFailure {
            source: Box::new(source),
        }
    }
}

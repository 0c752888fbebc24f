// src/handler.rs
//! Query-parameter request layer
//!
//! Turns a loose set of `key=value` parameters into [`FilterCriteria`], runs the selection
//! and renders the outcome as a status code plus body.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::error::MonitorError;
use crate::filter::{DEFAULT_DAYS_TO_LOOK_BACK, FilterCriteria};
use crate::monitor::CertificateMonitor;
use crate::report::SelectionReport;

pub const PARAM_CA_ID: &str = "caID";
pub const PARAM_EXCLUDE_REVOKED: &str = "excludeRevoked";
pub const PARAM_EXCLUDE_EXPIRED: &str = "excludeExpired";
pub const PARAM_ONLY_LINT_ERRORS: &str = "onlyLINTErrors";
pub const PARAM_EXCLUDE_PRECERTIFICATES: &str = "excludePreCertificates";
pub const PARAM_DAYS_TO_LOOK_BACK: &str = "daysToLookBack";
pub const PARAM_VERBOSE: &str = "verbose";

/// Problems with the parameters themselves, found before any selection runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("caID not set")]
    MissingCaId,

    #[error("caID must be a positive integer, got {0}")]
    NonPositiveCaId(i64),

    #[error("{name} set but cannot be parsed: '{value}'")]
    Unparsable { name: String, value: String },

    #[error("{name} given more than once")]
    Duplicate { name: String },
}

/// Parameters keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct QueryParameters {
    values: HashMap<String, String>,
}

impl QueryParameters {
    /// Build from key/value pairs; a key repeated in any casing is rejected
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ParameterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = HashMap::new();

        for (key, value) in pairs {
            let key = key.as_ref();
            if values.insert(key.to_ascii_lowercase(), value.into()).is_some() {
                return Err(ParameterError::Duplicate {
                    name: key.to_string(),
                });
            }
        }

        Ok(Self { values })
    }

    /// Parse a URL query string such as `caID=52410&excludeRevoked=true`
    pub fn parse(query: &str) -> Result<Self, ParameterError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Values used for parameters the request leaves out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDefaults {
    #[serde(default)]
    pub exclude_revoked: bool,

    #[serde(default = "default_true")]
    pub exclude_expired: bool,

    #[serde(default)]
    pub only_lint_errors: bool,

    #[serde(default)]
    pub exclude_precertificates: bool,

    #[serde(default = "default_days_to_look_back")]
    pub days_to_look_back: i32,

    #[serde(default = "default_true")]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

fn default_days_to_look_back() -> i32 {
    DEFAULT_DAYS_TO_LOOK_BACK
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            exclude_revoked: false,
            exclude_expired: default_true(),
            only_lint_errors: false,
            exclude_precertificates: false,
            days_to_look_back: default_days_to_look_back(),
            verbose: default_true(),
        }
    }
}

/// A fully parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    pub criteria: FilterCriteria,
    pub verbose: bool,
}

/// Status code and body handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn ok(body: String) -> Self {
        Self { status_code: 200, body }
    }

    pub fn bad_request(body: String) -> Self {
        Self { status_code: 400, body }
    }

    pub fn internal_error(body: String) -> Self {
        Self { status_code: 500, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Resolve every parameter against `defaults`
pub fn parse_request(
    params: &QueryParameters,
    defaults: &RequestDefaults,
) -> Result<RequestOptions, ParameterError> {
    let raw_ca_id = params.get(PARAM_CA_ID).ok_or(ParameterError::MissingCaId)?;
    let ca_id: i64 = raw_ca_id
        .trim()
        .parse()
        .map_err(|_| unparsable(PARAM_CA_ID, raw_ca_id))?;
    if ca_id <= 0 {
        return Err(ParameterError::NonPositiveCaId(ca_id));
    }
    debug!("{} set to {}", PARAM_CA_ID, ca_id);

    let criteria = FilterCriteria::for_ca(ca_id)
        .exclude_revoked(bool_param(params, PARAM_EXCLUDE_REVOKED, defaults.exclude_revoked)?)
        .exclude_expired(bool_param(params, PARAM_EXCLUDE_EXPIRED, defaults.exclude_expired)?)
        .only_lint_errors(bool_param(params, PARAM_ONLY_LINT_ERRORS, defaults.only_lint_errors)?)
        .exclude_precertificates(bool_param(
            params,
            PARAM_EXCLUDE_PRECERTIFICATES,
            defaults.exclude_precertificates,
        )?)
        .days_to_look_back(int_param(params, PARAM_DAYS_TO_LOOK_BACK, defaults.days_to_look_back)?);

    let verbose = bool_param(params, PARAM_VERBOSE, defaults.verbose)?;

    Ok(RequestOptions { criteria, verbose })
}

fn bool_param(params: &QueryParameters, name: &str, default: bool) -> Result<bool, ParameterError> {
    let Some(raw) = params.get(name) else {
        debug!("{} not set, using {}", name, default);
        return Ok(default);
    };

    let value = match raw.trim() {
        v if v.eq_ignore_ascii_case("true") => true,
        v if v.eq_ignore_ascii_case("false") => false,
        _ => return Err(unparsable(name, raw)),
    };
    debug!("{} set to {}", name, value);

    Ok(value)
}

fn int_param(params: &QueryParameters, name: &str, default: i32) -> Result<i32, ParameterError> {
    let Some(raw) = params.get(name) else {
        debug!("{} not set, using {}", name, default);
        return Ok(default);
    };

    let value = raw.trim().parse().map_err(|_| unparsable(name, raw))?;
    debug!("{} set to {}", name, value);

    Ok(value)
}

fn unparsable(name: &str, value: &str) -> ParameterError {
    ParameterError::Unparsable {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Run the selection a parsed request describes
pub async fn execute(
    monitor: &CertificateMonitor,
    options: &RequestOptions,
) -> Result<SelectionReport, MonitorError> {
    let results = monitor.select(&options.criteria).await?;
    Ok(SelectionReport::new(&options.criteria, results))
}

/// Parse, select and render in one step
pub async fn handle(
    monitor: &CertificateMonitor,
    params: &QueryParameters,
    defaults: &RequestDefaults,
) -> ApiResponse {
    let options = match parse_request(params, defaults) {
        Ok(options) => options,
        Err(e) => {
            info!("Rejected request: {}", e);
            return ApiResponse::bad_request(e.to_string());
        }
    };

    let report = match execute(monitor, &options).await {
        Ok(report) => report,
        Err(e) if e.is_client_error() => return ApiResponse::bad_request(e.to_string()),
        Err(e) => {
            error!("Selection for CA {} failed: {}", options.criteria.ca_id, e);
            return ApiResponse::internal_error(e.to_string());
        }
    };

    render(&report, options.verbose)
}

/// Body for a successful selection
pub fn render(report: &SelectionReport, verbose: bool) -> ApiResponse {
    if !verbose {
        return ApiResponse::ok(report.summary());
    }

    match report.to_json_pretty() {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => {
            error!("Failed to serialize report: {}", e);
            ApiResponse::internal_error(format!("failed to serialize report: {}", e))
        }
    }
}

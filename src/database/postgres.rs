// src/database/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Postgres, QueryBuilder, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::mapping::{CertificateField, ColumnMap};
use super::{CertificateQuery, CertificateSource};
use crate::config::DatabaseConfig;
use crate::error::MonitorError;
use crate::filter::{Predicate, lookback_cutoff};
use crate::types::{
    Certificate, CertificateType, CertificationAuthority, PRECERTIFICATE_POISON_MARKER,
};

// Split around the bound poison pattern, evaluation instant and CA id
const SELECT_CERTIFICATES_HEAD: &str = r#"
select CERTIFICATE_ID,
       SERIAL_NUMBER,
       SUBJECT_DISTINGUISHED_NAME,
       CERTIFICATE_TYPE,
       NOT_BEFORE,
       NOT_AFTER,
       FIRST_SEEN,
       REVOKED,
       LINT_ERRORS,
       EXPIRED
from
    ( select C.ID::bigint CERTIFICATE_ID,
             X509_SERIALNUMBER(C.CERTIFICATE) SERIAL_NUMBER,
             X509_SUBJECTNAME(C.CERTIFICATE) SUBJECT_DISTINGUISHED_NAME,
             (case when X509_PRINT(C.CERTIFICATE) like "#;

const SELECT_CERTIFICATES_TYPE_TAIL: &str = r#" then 'Precertificate'
              else 'Certificate'
              end) CERTIFICATE_TYPE,
             X509_NOTBEFORE(C.CERTIFICATE) NOT_BEFORE,
             X509_NOTAFTER(C.CERTIFICATE) NOT_AFTER,
             CTLE.FIRST_SEEN FIRST_SEEN,
             COALESCE(CRL.REVOKED, 0) REVOKED,
             COALESCE(LCI.LINT_ERRORS, 0) LINT_ERRORS,
             X509_NOTAFTER(C.CERTIFICATE) < "#;

const SELECT_CERTIFICATES_JOINS: &str = r#" EXPIRED
     from CERTIFICATE C
     join lateral
         (select MIN(CTLE.ENTRY_TIMESTAMP) FIRST_SEEN,
                 CTLE.CERTIFICATE_ID
          from CT_LOG_ENTRY CTLE
          where CTLE.CERTIFICATE_ID = C.ID
          group by CTLE.CERTIFICATE_ID) CTLE on true
     left join lateral
         (select COUNT(CRL.CA_ID) REVOKED,
                 CRL.SERIAL_NUMBER
          from CRL_REVOKED CRL
          where CRL.CA_ID = C.ISSUER_CA_ID
              and CRL.SERIAL_NUMBER = X509_SERIALNUMBER(C.CERTIFICATE)
          group by CRL.SERIAL_NUMBER) CRL on true
     left join lateral
         (select COUNT(LCI.CERTIFICATE_ID) LINT_ERRORS,
                 LCI.CERTIFICATE_ID
          from LINT_CERT_ISSUE LCI
          where LCI.CERTIFICATE_ID = C.ID
          group by LCI.CERTIFICATE_ID) LCI on true
     where C.ISSUER_CA_ID = "#;

const SELECT_CERTIFICATES_ORDER: &str = "
order by
   FIRST_SEEN desc,
   CERTIFICATE_ID asc";

const SELECT_CA: &str = r#"
select ID::bigint id,
       NAME name,
       PUBLIC_KEY public_key,
       BRAND brand,
       COALESCE(LINTING_APPLIES, true) linting_applies,
       NO_OF_CERTS_ISSUED::bigint no_of_certs_issued
from CA
where ID = $1
"#;

// Earliest year a PostgreSQL `timestamp` holds (4713 BC)
const POSTGRES_MIN_YEAR: i32 = -4712;

/// Certificate source reading the crt.sh `certwatch` database
pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    /// Connect a pool using the configured limits
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        // sqlx 0.8.x doesn't recognize some libpq parameters (e.g. 'channel_binding')
        let cleaned_url = Self::clean_connection_string(&config.url);

        let options = PgConnectOptions::from_str(&cleaned_url)
            .context("Invalid PostgreSQL connection string")?
            .application_name(&config.application_name)
            .options([(
                "statement_timeout",
                format!("{}s", config.statement_timeout_secs),
            )]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        info!("Connected to PostgreSQL successfully");

        Ok(Self { pool })
    }

    /// Remove connection string parameters sqlx would warn about
    fn clean_connection_string(url_str: &str) -> String {
        use url::Url;

        if let Ok(mut url) = Url::parse(url_str) {
            let unsupported_params = ["channel_binding"];

            let cleaned_pairs: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| !unsupported_params.contains(&key.as_ref()))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            if cleaned_pairs.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(cleaned_pairs);
            }

            url.to_string()
        } else {
            url_str.to_string()
        }
    }

    /// Compose the certwatch statement for one selection
    fn build_select(query: &CertificateQuery) -> QueryBuilder<'static, Postgres> {
        let now = query.now.naive_utc();

        let mut builder = QueryBuilder::new(SELECT_CERTIFICATES_HEAD);
        builder.push_bind(format!("%{}%", PRECERTIFICATE_POISON_MARKER));
        builder.push(SELECT_CERTIFICATES_TYPE_TAIL);
        builder.push_bind(now);
        builder.push(SELECT_CERTIFICATES_JOINS);
        builder.push_bind(query.ca_id);
        builder.push(") as ALL_CERTS\nwhere true");

        for predicate in &query.predicates {
            match *predicate {
                Predicate::NotRevoked => {
                    builder.push("\n  and REVOKED = 0");
                }
                Predicate::HasLintErrors => {
                    builder.push("\n  and LINT_ERRORS > 0");
                }
                Predicate::NotExpired => {
                    builder.push("\n  and NOT_AFTER > ");
                    builder.push_bind(now);
                }
                Predicate::NotPrecertificate => {
                    builder.push("\n  and CERTIFICATE_TYPE <> 'Precertificate'");
                }
                Predicate::FirstSeenWithin { days } => {
                    // No lower bound the server can represent, so every sighting qualifies
                    if let Some(cutoff) = postgres_cutoff(lookback_cutoff(query.now, days)) {
                        builder.push("\n  and FIRST_SEEN > ");
                        builder.push_bind(cutoff);
                    }
                }
            }
        }

        builder.push(SELECT_CERTIFICATES_ORDER);
        builder
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn column<'r, T>(row: &'r PgRow, columns: &ColumnMap, field: CertificateField) -> Result<T, MonitorError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(columns.index(field))
        .map_err(|e| MonitorError::mapping(field.name(), e.to_string()))
}

/// Look-back cutoff as a bindable `timestamp`, `None` when it predates the server's range
fn postgres_cutoff(cutoff: DateTime<Utc>) -> Option<NaiveDateTime> {
    (cutoff.year() >= POSTGRES_MIN_YEAR).then(|| cutoff.naive_utc())
}

fn utc(timestamp: NaiveDateTime) -> DateTime<Utc> {
    timestamp.and_utc()
}

fn certificate_type(label: &str) -> Result<CertificateType, MonitorError> {
    CertificateType::from_str(label)
        .map_err(|reason| MonitorError::mapping(CertificateField::CertificateType.name(), reason))
}

fn lint_error_count(count: i64) -> Result<u64, MonitorError> {
    u64::try_from(count).map_err(|_| {
        MonitorError::mapping(
            CertificateField::LintErrors.name(),
            format!("negative count {}", count),
        )
    })
}

fn subject_name(subject: Option<String>) -> String {
    subject.unwrap_or_default()
}

fn map_row(row: &PgRow, columns: &ColumnMap) -> Result<Certificate, MonitorError> {
    let label: String = column(row, columns, CertificateField::CertificateType)?;
    let revoked: i64 = column(row, columns, CertificateField::Revoked)?;
    let lint_errors: i64 = column(row, columns, CertificateField::LintErrors)?;
    let subject: Option<String> = column(row, columns, CertificateField::SubjectDistinguishedName)?;

    Ok(Certificate {
        certificate_id: column(row, columns, CertificateField::CertificateId)?,
        serial_number: column(row, columns, CertificateField::SerialNumber)?,
        subject_distinguished_name: subject_name(subject),
        certificate_type: certificate_type(&label)?,
        not_before: utc(column(row, columns, CertificateField::NotBefore)?),
        not_after: utc(column(row, columns, CertificateField::NotAfter)?),
        first_seen: utc(column(row, columns, CertificateField::FirstSeen)?),
        revoked: revoked > 0,
        expired: column(row, columns, CertificateField::Expired)?,
        lint_errors: lint_error_count(lint_errors)?,
    })
}

#[async_trait]
impl CertificateSource for PostgresSource {
    async fn select(&self, query: &CertificateQuery) -> Result<Vec<Certificate>, MonitorError> {
        let mut builder = Self::build_select(query);
        let mut rows = builder.build().fetch(&self.pool);

        let mut column_map: Option<ColumnMap> = None;
        let mut certificates = Vec::new();

        while let Some(row) = rows.try_next().await? {
            // Labels are identical for every row of a statement
            let columns = match column_map.take() {
                Some(columns) => columns,
                None => ColumnMap::resolve(row.columns().iter().map(|c| c.name()))?,
            };
            certificates.push(map_row(&row, &columns)?);
            column_map = Some(columns);
        }

        debug!(
            "Fetched {} certificates for CA {} from PostgreSQL",
            certificates.len(),
            query.ca_id
        );

        Ok(certificates)
    }

    async fn certification_authority(
        &self,
        ca_id: i64,
    ) -> Result<Option<CertificationAuthority>, MonitorError> {
        let ca = sqlx::query_as::<_, CertificationAuthority>(SELECT_CA)
            .bind(ca_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(ca)
    }

    async fn ping(&self) -> Result<(), MonitorError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn describe(&self) -> &'static str {
        "postgres"
    }
}

// src/output/csv.rs
//! CSV output handler

use crate::output::OutputHandler;
use crate::report::SelectionReport;
use crate::types::Certificate;
use async_trait::async_trait;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;

/// One certificate per row, header first
pub struct CsvOutput {
    writer: Mutex<csv::Writer<Box<dyn Write + Send>>>,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    certificate_id: i64,
    serial_number: String,
    subject_distinguished_name: &'a str,
    certificate_type: &'static str,
    not_before: String,
    not_after: String,
    first_seen: String,
    revoked: bool,
    expired: bool,
    lint_errors: u64,
    crtsh_link: String,
}

impl<'a> From<&'a Certificate> for CsvRow<'a> {
    fn from(cert: &'a Certificate) -> Self {
        Self {
            certificate_id: cert.certificate_id,
            serial_number: cert.hex_serial_number(),
            subject_distinguished_name: &cert.subject_distinguished_name,
            certificate_type: cert.certificate_type.as_str(),
            not_before: cert.not_before.to_rfc3339(),
            not_after: cert.not_after.to_rfc3339(),
            first_seen: cert.first_seen.to_rfc3339(),
            revoked: cert.revoked,
            expired: cert.expired,
            lint_errors: cert.lint_errors,
            crtsh_link: cert.crtsh_link(),
        }
    }
}

impl CsvOutput {
    /// Create a new CsvOutput that writes to stdout
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Create a new CsvOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self::with_writer(Box::new(file))
    }

    fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(writer)),
        }
    }
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for CsvOutput {
    async fn emit_report(&self, report: &SelectionReport) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("CSV output writer poisoned"))?;

        for cert in &report.results {
            writer.serialize(CsvRow::from(cert))?;
        }

        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("CSV output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

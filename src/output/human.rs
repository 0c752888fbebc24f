// src/output/human.rs
//! Human-readable colored terminal output

use crate::output::OutputHandler;
use crate::report::SelectionReport;
use crate::types::{Certificate, CertificateType, CertificationAuthority};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

/// Human-readable output handler with colored terminal output
pub struct HumanOutput {
    writer: Mutex<Box<dyn Write + Send>>,
    use_colors: bool,
}

impl HumanOutput {
    /// Create a new HumanOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
            use_colors: is_terminal::is_terminal(std::io::stdout()),
        }
    }

    /// Create a new HumanOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self {
            writer: Mutex::new(Box::new(file)),
            use_colors: false, // No colors when writing to file
        }
    }

    fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn write_certificate(&self, writer: &mut dyn Write, cert: &Certificate) -> io::Result<()> {
        let first_seen = Self::format_timestamp(&cert.first_seen);
        let validity = format!(
            "{} .. {}",
            Self::format_timestamp(&cert.not_before),
            Self::format_timestamp(&cert.not_after)
        );

        let mut flags = Vec::new();
        if cert.certificate_type == CertificateType::Precertificate {
            flags.push("precert".to_string());
        }
        if cert.revoked {
            flags.push("revoked".to_string());
        }
        if cert.expired {
            flags.push("expired".to_string());
        }
        if cert.lint_errors > 0 {
            flags.push(format!("{} lint errors", cert.lint_errors));
        }

        if self.use_colors {
            let marker = if cert.revoked || cert.lint_errors > 0 {
                "[!]".red().bold()
            } else {
                "[+]".green().bold()
            };
            writeln!(
                writer,
                "{} {} {}",
                format!("[{}]", first_seen).dimmed(),
                marker,
                cert.subject_distinguished_name.cyan().bold()
            )?;
            if !flags.is_empty() {
                writeln!(writer, "    {} {}", "Flags:".dimmed(), flags.join(", ").yellow())?;
            }
            writeln!(writer, "    {} {}", "Serial:".dimmed(), cert.hex_serial_number())?;
            writeln!(writer, "    {} {}", "Valid:".dimmed(), validity)?;
            writeln!(writer, "    {} {}", "Link:".dimmed(), cert.crtsh_link().underline())?;
        } else {
            let marker = if cert.revoked || cert.lint_errors > 0 { "[!]" } else { "[+]" };
            writeln!(writer, "[{}] {} {}", first_seen, marker, cert.subject_distinguished_name)?;
            if !flags.is_empty() {
                writeln!(writer, "    Flags: {}", flags.join(", "))?;
            }
            writeln!(writer, "    Serial: {}", cert.hex_serial_number())?;
            writeln!(writer, "    Valid: {}", validity)?;
            writeln!(writer, "    Link: {}", cert.crtsh_link())?;
        }

        Ok(())
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for HumanOutput {
    async fn emit_authority(&self, ca: &CertificationAuthority) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;

        let brand = ca.brand.as_deref().unwrap_or("-");
        if self.use_colors {
            writeln!(writer, "{} {}", format!("CA {}", ca.id).bold(), ca.name.cyan())?;
        } else {
            writeln!(writer, "CA {} {}", ca.id, ca.name)?;
        }
        writeln!(
            writer,
            "    Brand: {}  Linting applies: {}  Certificates issued: {}",
            brand, ca.linting_applies, ca.no_of_certs_issued
        )?;
        writeln!(writer)?;

        writer.flush()?;
        Ok(())
    }

    async fn emit_report(&self, report: &SelectionReport) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;

        for cert in &report.results {
            self.write_certificate(&mut *writer, cert)?;
        }

        if !report.results.is_empty() {
            writeln!(writer)?;
        }
        if self.use_colors {
            writeln!(writer, "{}", report.summary().bold())?;
        } else {
            writeln!(writer, "{}", report.summary())?;
        }

        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

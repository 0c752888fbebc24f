// src/output/json.rs
//! JSON output handler

use crate::output::OutputHandler;
use crate::report::SelectionReport;
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes the verbose report as pretty-printed JSON
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Create a new JsonOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a new JsonOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self {
            writer: Mutex::new(Box::new(file)),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn emit_report(&self, report: &SelectionReport) -> anyhow::Result<()> {
        let json = report.to_json_pretty()?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::sample_report;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_json_output_is_the_report() {
        let temp_file = NamedTempFile::new().unwrap();
        let handler = JsonOutput::to_file(temp_file.reopen().unwrap());

        handler.emit_report(&sample_report()).await.unwrap();
        handler.flush().await.unwrap();

        let written = std::fs::read_to_string(temp_file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();

        assert_eq!(value["CAID"], 52410);
        assert_eq!(value["Results"].as_array().unwrap().len(), 2);
        assert_eq!(value["Results"][0]["CertificateID"], "1001");
        assert_eq!(value["Results"][0]["SerialNumber"], "Chv/");
        assert_eq!(value["Results"][1]["CertificateType"], "Precertificate");
    }

    #[tokio::test]
    async fn test_json_flush() {
        let handler = JsonOutput::new();
        assert!(handler.flush().await.is_ok());
    }
}

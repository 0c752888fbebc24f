// src/output/mod.rs
//! Output handling for crtsh-monitor
//!
//! Each handler renders one selection report to stdout or a file.

use crate::report::SelectionReport;
use crate::types::CertificationAuthority;
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;

pub mod csv;
pub mod human;
pub mod json;
pub mod response;

/// Trait for output handlers that render selection results
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Emit the CA a selection ran against
    ///
    /// Formats that have no place for it log it instead.
    async fn emit_authority(&self, ca: &CertificationAuthority) -> anyhow::Result<()> {
        tracing::info!("CA {}: {}", ca.id, ca.name);
        Ok(())
    }

    /// Emit a finished selection
    async fn emit_report(&self, report: &SelectionReport) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Create (or truncate) the file given with `--output`
pub fn create_file(path: &Path) -> anyhow::Result<File> {
    use anyhow::Context;

    File::create(path).with_context(|| format!("Failed to create output file {:?}", path))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_create_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let mut file = create_file(&path).unwrap();
        file.write_all(b"hello").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_create_file_bad_path() {
        let err = create_file(Path::new("/nonexistent/dir/out.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to create output file"));
    }
}

// src/output/response.rs
//! Raw endpoint body output

use crate::handler::ApiResponse;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes exactly what the HTTP endpoint would answer with
pub struct ResponseOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ResponseOutput {
    /// Create a new ResponseOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a new ResponseOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self {
            writer: Mutex::new(Box::new(file)),
        }
    }

    /// Write a response body, whatever its status
    pub fn emit_response(&self, response: &ApiResponse) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("response writer poisoned"))?;
        writeln!(writer, "{}", response.body)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for ResponseOutput {
    fn default() -> Self {
        Self::new()
    }
}

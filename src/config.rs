// src/config.rs

use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::handler::RequestDefaults;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Live certwatch database
    Postgres,
    /// JSON dataset file
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSourceConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_backend() -> String { "postgres".to_string() }

impl DataSourceConfig {
    pub fn backend(&self) -> anyhow::Result<Backend> {
        match self.backend.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "file" => Ok(Backend::File),
            other => bail!("Unknown data source backend '{}' (expected 'postgres' or 'file')", other),
        }
    }
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

/// The public crt.sh guest replica
fn default_database_url() -> String {
    "postgresql://guest@crt.sh:5432/certwatch".to_string()
}
fn default_max_connections() -> u32 { 5 }
fn default_statement_timeout() -> u64 { 60 }
fn default_acquire_timeout() -> u64 { 30 }
fn default_application_name() -> String { "crt.sh Monitor".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            statement_timeout_secs: default_statement_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
            application_name: default_application_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MappingConfig {
    /// Match result columns to fields ignoring case and separators
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
}

fn default_case_insensitive() -> bool { true }

impl Default for MappingConfig {
    fn default() -> Self {
        Self { case_insensitive: default_case_insensitive() }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub request_defaults: RequestDefaults,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        cfg.data_source.backend()?;
        Ok(cfg)
    }
}

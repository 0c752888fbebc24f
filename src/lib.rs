// src/lib.rs
// Library interface for crtsh-monitor
pub mod aggregator;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handler;
pub mod metrics;
pub mod monitor;
pub mod output;
pub mod progress;
pub mod report;
pub mod types;

pub use error::MonitorError;
pub use filter::FilterCriteria;
pub use monitor::CertificateMonitor;
pub use types::{Certificate, CertificateType, CertificationAuthority};

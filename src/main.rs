// src/main.rs
use anyhow::Context;
use clap::Parser;
use crtsh_monitor::cli::{Cli, OutputFormat};
use crtsh_monitor::config::{Backend, Config};
use crtsh_monitor::database::mapping::{self, LabelMatching};
use crtsh_monitor::database::{CertificateSource, DatasetSource, PostgresSource};
use crtsh_monitor::handler::{self, QueryParameters};
use crtsh_monitor::metrics;
use crtsh_monitor::monitor::CertificateMonitor;
use crtsh_monitor::output::{self, OutputHandler, csv, human, json, response};
use crtsh_monitor::progress::QuerySpinner;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate arguments
    cli.validate()?;

    // Load config file, or fall back to built-in defaults
    let config = match cli.config {
        Some(ref path) => Config::from_file(Path::new(path))?,
        None => Config::default(),
    };

    // Initialize logging
    let log_level = cli.log_level().unwrap_or(config.logging.level.as_str());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting crtsh-monitor...");

    let matching = if config.mapping.case_insensitive {
        LabelMatching::CaseInsensitive
    } else {
        LabelMatching::Exact
    };
    if !mapping::configure_label_matching(matching) {
        tracing::warn!("Label matching already configured, keeping {:?}", mapping::label_matching());
    }

    if cli.metrics {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to register metrics: {}", e);
        }
    }

    // Build the certificate source
    let mut postgres: Option<Arc<PostgresSource>> = None;
    let source: Arc<dyn CertificateSource> = if let Some(ref dataset) = cli.dataset {
        Arc::new(DatasetSource::from_file(Path::new(dataset)).await?)
    } else {
        match config.data_source.backend()? {
            Backend::Postgres => {
                let pg = Arc::new(
                    PostgresSource::connect(&config.database)
                        .await
                        .context("Failed to connect to the certwatch database")?,
                );
                pg.ping()
                    .await
                    .context("certwatch database did not answer the health check")?;
                postgres = Some(pg.clone());
                pg
            }
            Backend::File => {
                let file = config.data_source.file.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "data_source.backend is 'file' but data_source.file is not set. \
                        Set it in the config or pass --dataset"
                    )
                })?;
                Arc::new(DatasetSource::from_file(file).await?)
            }
        }
    };
    tracing::info!("Using {} certificate source", source.describe());

    let monitor = CertificateMonitor::new(source);
    let params = QueryParameters::from_pairs(cli.parameters()?)?;

    let result = run(&cli, &config, &monitor, &params).await;

    if let Some(pg) = postgres {
        pg.close().await;
    }

    if cli.metrics {
        eprintln!("{}", metrics::export_metrics());
    }

    result
}

async fn run(
    cli: &Cli,
    config: &Config,
    monitor: &CertificateMonitor,
    params: &QueryParameters,
) -> anyhow::Result<()> {
    let file = match cli.output {
        Some(ref path) => Some(output::create_file(Path::new(path))?),
        None => None,
    };

    // The raw endpoint body, error bodies included
    if cli.output_format() == OutputFormat::Response {
        let spinner = QuerySpinner::new(cli.should_show_progress());
        spinner.set_message("Handling request");
        let response = handler::handle(monitor, params, &config.request_defaults).await;
        spinner.finish();

        let out = match file {
            Some(file) => response::ResponseOutput::to_file(file),
            None => response::ResponseOutput::new(),
        };
        out.emit_response(&response)?;

        if !response.is_success() {
            anyhow::bail!("Request failed with status {}", response.status_code);
        }
        return Ok(());
    }

    let options = handler::parse_request(params, &config.request_defaults)?;

    let out: Box<dyn OutputHandler> = match (cli.output_format(), file) {
        (OutputFormat::Json, Some(file)) => Box::new(json::JsonOutput::to_file(file)),
        (OutputFormat::Json, None) => Box::new(json::JsonOutput::new()),
        (OutputFormat::Csv, Some(file)) => Box::new(csv::CsvOutput::to_file(file)),
        (OutputFormat::Csv, None) => Box::new(csv::CsvOutput::new()),
        (_, Some(file)) => Box::new(human::HumanOutput::to_file(file)),
        (_, None) => Box::new(human::HumanOutput::new()),
    };

    if cli.show_ca {
        match monitor.certification_authority(options.criteria.ca_id).await? {
            Some(ca) => out.emit_authority(&ca).await?,
            None => tracing::warn!("CA {} not found", options.criteria.ca_id),
        }
    }

    let spinner = QuerySpinner::new(cli.should_show_progress());
    spinner.set_message(format!(
        "Selecting certificates of CA {}",
        options.criteria.ca_id
    ));
    let report = handler::execute(monitor, &options).await;
    spinner.finish();

    let report = report.with_context(|| {
        format!("Selection for CA {} failed", options.criteria.ca_id)
    })?;

    out.emit_report(&report).await?;
    out.flush().await?;

    Ok(())
}

// src/cli.rs
use clap::Parser;

/// crtsh-monitor: report certificates a CA has logged to Certificate Transparency
///
/// Selects certificates of one CA from the crt.sh certwatch database (or a dataset
/// snapshot) using the same query parameters as the HTTP endpoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "crtsh-monitor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to TOML config file (built-in defaults when omitted)
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Query string, e.g. "caID=52410&excludeRevoked=true"
    #[arg(long = "query")]
    pub query: Option<String>,

    /// Single query parameter as KEY=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Read certificates from a JSON dataset instead of the database
    #[arg(long = "dataset")]
    pub dataset: Option<String>,

    // ===== Output Format =====
    /// Output the verbose JSON report
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Output results in CSV format
    #[arg(long = "csv")]
    pub csv: bool,

    /// Output exactly the body the HTTP endpoint would return
    #[arg(long = "response")]
    pub response: bool,

    // ===== Output Destination =====
    /// Write output to file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    // ===== Utility =====
    /// Print the CA record before the results
    #[arg(long = "show-ca")]
    pub show_ca: bool,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long = "metrics")]
    pub metrics: bool,

    /// Disable progress indicator
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        let format_count = [self.json, self.csv, self.response]
            .iter()
            .filter(|&&x| x)
            .count();

        if format_count > 1 {
            anyhow::bail!(
                "Cannot specify multiple output formats. \
                Choose one of: --json, --csv, or --response"
            );
        }

        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        if self.query.is_none() && self.params.is_empty() {
            anyhow::bail!("No query given. Use --query or at least one --param (caID is required)");
        }

        for param in &self.params {
            split_param(param)?;
        }

        Ok(())
    }

    /// Determine the output format based on flags
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else if self.response {
            OutputFormat::Response
        } else {
            OutputFormat::Human
        }
    }

    /// Spinner only when machine-readable output is not going to stdout
    pub fn should_show_progress(&self) -> bool {
        if self.no_progress {
            return false;
        }
        self.output.is_some() || self.output_format() == OutputFormat::Human
    }

    /// Log level from verbose/quiet flags, `None` when neither is set
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }

    /// Every parameter from `--query` followed by the `--param` pairs
    pub fn parameters(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut pairs: Vec<(String, String)> = match &self.query {
            Some(query) => {
                let query = query.strip_prefix('?').unwrap_or(query);
                url::form_urlencoded::parse(query.as_bytes()).into_owned().collect()
            }
            None => Vec::new(),
        };

        for param in &self.params {
            let (key, value) = split_param(param)?;
            pairs.push((key.to_string(), value.to_string()));
        }

        Ok(pairs)
    }
}

fn split_param(param: &str) -> anyhow::Result<(&str, &str)> {
    match param.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => anyhow::bail!("Invalid --param '{}': expected KEY=VALUE", param),
    }
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text output (default)
    Human,
    /// Verbose JSON report
    Json,
    /// CSV format, one certificate per row
    Csv,
    /// Raw endpoint body
    Response,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_optional() {
        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID=1"]);
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["crtsh-monitor", "--config", "custom.toml", "-p", "caID=1"]);
        assert_eq!(cli.config.as_deref(), Some("custom.toml"));
    }

    #[test]
    fn test_output_formats() {
        let cases = [
            ("--json", OutputFormat::Json),
            ("--csv", OutputFormat::Csv),
            ("--response", OutputFormat::Response),
        ];
        for (flag, format) in cases {
            let cli = Cli::parse_from(["crtsh-monitor", flag, "-p", "caID=1"]);
            assert_eq!(cli.output_format(), format);
        }

        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID=1"]);
        assert_eq!(cli.output_format(), OutputFormat::Human);
    }

    #[test]
    fn test_multiple_formats_invalid() {
        let cli = Cli::parse_from(["crtsh-monitor", "--json", "--csv", "-p", "caID=1"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_verbose_and_quiet_invalid() {
        let cli = Cli::parse_from(["crtsh-monitor", "--verbose", "--quiet", "-p", "caID=1"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_query_required() {
        let cli = Cli::parse_from(["crtsh-monitor", "--json"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_malformed_param_invalid() {
        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["crtsh-monitor", "-p", "=5"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_parameters_merge_query_and_params() {
        let cli = Cli::parse_from([
            "crtsh-monitor",
            "--query", "?caID=52410&excludeRevoked=true",
            "-p", "daysToLookBack=90",
            "--param", "verbose=false",
        ]);
        assert!(cli.validate().is_ok());

        let pairs = cli.parameters().unwrap();
        assert_eq!(
            pairs,
            vec![
                ("caID".to_string(), "52410".to_string()),
                ("excludeRevoked".to_string(), "true".to_string()),
                ("daysToLookBack".to_string(), "90".to_string()),
                ("verbose".to_string(), "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_param_value_may_contain_equals() {
        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID=1=2"]);
        let pairs = cli.parameters().unwrap();
        assert_eq!(pairs[0], ("caID".to_string(), "1=2".to_string()));
    }

    #[test]
    fn test_progress_rules() {
        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID=1"]);
        assert!(cli.should_show_progress());

        let cli = Cli::parse_from(["crtsh-monitor", "--json", "-p", "caID=1"]);
        assert!(!cli.should_show_progress());

        let cli = Cli::parse_from(["crtsh-monitor", "--json", "-o", "out.json", "-p", "caID=1"]);
        assert!(cli.should_show_progress());

        let cli = Cli::parse_from(["crtsh-monitor", "--no-progress", "-p", "caID=1"]);
        assert!(!cli.should_show_progress());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::parse_from(["crtsh-monitor", "--verbose", "-p", "caID=1"]);
        assert_eq!(cli.log_level(), Some("debug"));

        let cli = Cli::parse_from(["crtsh-monitor", "--quiet", "-p", "caID=1"]);
        assert_eq!(cli.log_level(), Some("warn"));

        let cli = Cli::parse_from(["crtsh-monitor", "-p", "caID=1"]);
        assert_eq!(cli.log_level(), None);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "crtsh-monitor",
            "-c", "test.toml",
            "-j",
            "-o", "report.json",
            "-p", "caID=7",
            "-q",
        ]);
        assert_eq!(cli.config.as_deref(), Some("test.toml"));
        assert!(cli.json);
        assert_eq!(cli.output.as_deref(), Some("report.json"));
        assert_eq!(cli.params, vec!["caID=7".to_string()]);
        assert!(cli.quiet);
    }
}

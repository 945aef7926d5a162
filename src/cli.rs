//! Command-line interface definitions for NYC Health Signals.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets (the open data app token) can also arrive via environment
//! variables, which is how the cron deployment passes them.

use clap::Parser;

/// Command-line arguments for the collector.
///
/// This struct defines all configuration options that can be passed to the
/// application at runtime. Options include output directories, the optional
/// config file, and open data credentials.
///
/// # Examples
///
/// ```sh
/// # Basic usage with required arguments
/// nyc_health_signals -j ./json -p ./pipeline
///
/// # With an open data app token
/// nyc_health_signals -j ./json -p ./pipeline --socrata-app-token YOUR_TOKEN
///
/// # Tighter lookback for a quick check
/// nyc_health_signals -j ./json -p ./pipeline --days-back 7
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the JSON snapshot files
    #[arg(short, long)]
    pub json_output_dir: String,

    /// Output directory for the pipeline message files
    #[arg(short, long)]
    pub pipeline_output_dir: String,

    /// Optional path to a YAML config file overriding the built-in sources
    #[arg(short, long)]
    pub config: Option<String>,

    /// App token for the NYC open data API (optional, raises the rate limit)
    #[arg(long, env = "SOCRATA_APP_TOKEN")]
    pub socrata_app_token: Option<String>,

    /// Override every source's lookback window, in days
    #[arg(long)]
    pub days_back: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "nyc_health_signals",
            "--json-output-dir",
            "./json",
            "--pipeline-output-dir",
            "./pipeline",
        ]);

        assert_eq!(cli.json_output_dir, "./json");
        assert_eq!(cli.pipeline_output_dir, "./pipeline");
        assert_eq!(cli.config, None);
        assert_eq!(cli.days_back, None);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "nyc_health_signals",
            "-j",
            "/tmp/json",
            "-p",
            "/tmp/pipeline",
            "-c",
            "/etc/health-signals.yaml",
        ]);

        assert_eq!(cli.json_output_dir, "/tmp/json");
        assert_eq!(cli.pipeline_output_dir, "/tmp/pipeline");
        assert_eq!(cli.config.as_deref(), Some("/etc/health-signals.yaml"));
    }

    #[test]
    fn test_days_back_parses_as_a_number() {
        let cli = Cli::parse_from([
            "nyc_health_signals",
            "-j",
            "./json",
            "-p",
            "./pipeline",
            "--days-back",
            "7",
        ]);

        assert_eq!(cli.days_back, Some(7));
    }

    #[test]
    fn test_output_dirs_are_required() {
        let result = Cli::try_parse_from(["nyc_health_signals", "-j", "./json"]);
        assert!(result.is_err());
    }
}

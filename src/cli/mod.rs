//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::executor::{RetryStrategy, StopStrategy};
use crate::models::Priority;

/// Test automation runner
#[derive(Parser, Debug)]
#[command(name = "testauto")]
#[command(version)]
#[command(about = "Run test suites with timeouts, stop and retry strategies")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a test suite
    Run(RunArgs),

    /// List suites and their cases
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Render a stored JSON run as a report
    Report(ReportArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite to run
    #[arg(default_value = "demo")]
    pub suite: String,

    /// Stop strategy (all-completed, first-not-pass, first-p0-not-pass)
    #[arg(short, long)]
    pub stop_strategy: Option<String>,

    /// Retry strategy (not-rerun, rerun-now, rerun-last)
    #[arg(short, long)]
    pub retry_strategy: Option<String>,

    /// Per-case timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Number of cases run at once
    #[arg(short, long)]
    pub parallel: Option<usize>,

    /// Only run these priorities (comma-separated, e.g. p0,p1)
    #[arg(long, value_delimiter = ',')]
    pub priority: Vec<String>,

    /// Also run cases marked incomplete
    #[arg(long)]
    pub include_incomplete: bool,

    /// Write an HTML report
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Export results as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Export results as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay command-line values on `config`
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(stop) = &self.stop_strategy {
            config.stop_strategy = StopStrategy::from_str(stop)
                .with_context(|| format!("Unknown stop strategy: {stop}"))?;
        }
        if let Some(retry) = &self.retry_strategy {
            config.retry_strategy = RetryStrategy::from_str(retry)
                .with_context(|| format!("Unknown retry strategy: {retry}"))?;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
        if self.html.is_some() {
            config.report.html = self.html.clone();
        }
        if self.json.is_some() {
            config.report.json = self.json.clone();
        }
        if self.csv.is_some() {
            config.report.csv = self.csv.clone();
        }
        config.validate()
    }

    /// Parsed `--priority` values
    pub fn priorities(&self) -> Result<Vec<Priority>> {
        self.priority
            .iter()
            .map(|p| Priority::from_str(p).with_context(|| format!("Unknown priority: {p}")))
            .collect()
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Only list this suite
    pub suite: Option<String>,

    /// Show detailed case information
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination (.yaml, .yml or .json)
        #[arg(default_value = "testauto.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Describe the environment variables
    Env,
}

/// Arguments for report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// JSON file written by `run --json`
    pub file: PathBuf,

    /// Output format (text, markdown, html)
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

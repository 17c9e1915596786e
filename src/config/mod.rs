//! Configuration module
//!
//! Handles loading and merging run configuration. Precedence, lowest first:
//! built-in defaults, config file, `TESTAUTO_*` environment, command line.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find, CONFIG_LOCATIONS};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::executor::{RetryStrategy, RunOptions, StopStrategy, DEFAULT_TIMEOUT_SECS};
use crate::recorder::ReportArtifacts;
use crate::utils::LogLevel;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// When to stop dispatching after a non-passing case
    pub stop_strategy: StopStrategy,

    /// When to re-run non-passing cases
    pub retry_strategy: RetryStrategy,

    /// Per-case timeout in seconds
    pub timeout_secs: u64,

    /// Number of cases run at once
    pub parallel: usize,

    pub log_level: LogLevel,

    /// Report artifacts written after the run
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            stop_strategy: StopStrategy::default(),
            retry_strategy: RetryStrategy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            parallel: 1,
            log_level: LogLevel::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Optional report artifact paths
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
}

impl ReportConfig {
    pub fn artifacts(&self) -> ReportArtifacts {
        ReportArtifacts {
            html: self.html.clone(),
            json: self.json.clone(),
            csv: self.csv.clone(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = file::read(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration; the extension picks YAML or JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        file::write(self, path.as_ref())
    }

    /// Resolve defaults, file and environment.
    ///
    /// `explicit` wins over `TESTAUTO_CONFIG`, which wins over the standard
    /// locations. Returns the file that was used, if any.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let env = EnvConfig::load();
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.config_file.clone().map(PathBuf::from))
            .or_else(find);

        let mut config = match &path {
            Some(path) => file::read(path)?,
            None => Self::default(),
        };
        config
            .apply_env(&env)
            .context("Invalid TESTAUTO_* environment variable")?;
        config.validate()?;

        Ok((config, path))
    }

    /// Overlay values taken from the environment
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(stop) = &env.stop_strategy {
            self.stop_strategy = StopStrategy::from_str(stop)
                .with_context(|| format!("Unknown stop strategy: {stop}"))?;
        }
        if let Some(retry) = &env.retry_strategy {
            self.retry_strategy = RetryStrategy::from_str(retry)
                .with_context(|| format!("Unknown retry strategy: {retry}"))?;
        }
        if let Some(level) = &env.log_level {
            self.log_level = LogLevel::from_str(level)
                .with_context(|| format!("Unknown log level: {level}"))?;
        }
        if let Some(timeout) = &env.timeout {
            self.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid TESTAUTO_TIMEOUT: {timeout}"))?;
        }
        if let Some(parallel) = &env.parallel {
            self.parallel = parallel
                .trim()
                .parse()
                .with_context(|| format!("Invalid TESTAUTO_PARALLEL: {parallel}"))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if self.parallel == 0 {
            bail!("parallel must be at least 1");
        }
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions::default()
            .with_stop(self.stop_strategy)
            .with_retry(self.retry_strategy)
            .with_timeout(self.timeout_secs)
            .with_concurrency(self.parallel)
    }

    /// Example configuration written by `config init`
    pub fn example() -> Self {
        Self {
            stop_strategy: StopStrategy::FirstP0NotPass,
            retry_strategy: RetryStrategy::RerunLast,
            timeout_secs: 600,
            parallel: 4,
            log_level: LogLevel::Info,
            report: ReportConfig {
                html: Some(PathBuf::from("reports/report.html")),
                json: Some(PathBuf::from("reports/report.json")),
                csv: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.parallel, 1);
        assert_eq!(config.run_options(), RunOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("stop_strategy: first-not-pass\nparallel: 3\n").unwrap();
        assert_eq!(config.stop_strategy, StopStrategy::FirstNotPass);
        assert_eq!(config.parallel, 3);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.report, ReportConfig::default());
    }

    #[test]
    fn test_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let config = AppConfig::example();

        for name in ["nested/testauto.yaml", "testauto.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            assert_eq!(AppConfig::load(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = AppConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            parallel: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "timeout_secs: 0\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            timeout: Some("5".to_string()),
            parallel: Some(" 8 ".to_string()),
            stop_strategy: Some("FIRST_P0_NOT_PASS".to_string()),
            retry_strategy: Some("2".to_string()),
            ..Default::default()
        };
        config.apply_env(&env).unwrap();

        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.parallel, 8);
        assert_eq!(config.stop_strategy, StopStrategy::FirstP0NotPass);
        assert_eq!(config.retry_strategy, RetryStrategy::RerunLast);

        let env = EnvConfig {
            retry_strategy: Some("sometimes".to_string()),
            ..Default::default()
        };
        assert!(config.apply_env(&env).is_err());
    }

    #[test]
    fn test_apply_env_rejects_bad_numbers() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            timeout: Some("abc".to_string()),
            ..Default::default()
        };
        let err = config.apply_env(&env).unwrap_err();
        assert!(err.to_string().contains("TESTAUTO_TIMEOUT"));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);

        let env = EnvConfig {
            parallel: Some("-2".to_string()),
            ..Default::default()
        };
        let err = config.apply_env(&env).unwrap_err();
        assert!(err.to_string().contains("TESTAUTO_PARALLEL"));
        assert_eq!(config.parallel, 1);
    }

    #[test]
    fn test_report_artifacts() {
        let artifacts = AppConfig::example().report.artifacts();
        assert_eq!(artifacts.html, Some(PathBuf::from("reports/report.html")));
        assert!(artifacts.csv.is_none());
    }
}

//! Run snapshots and file export
//!
//! A [`StoredRun`] freezes the records of a run so reports and exports never
//! hold a lock on a live case.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::models::{ExecutionRecord, Priority, TestCase, TestSummary};
use crate::recorder::RecorderError;

/// Snapshot of a whole run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Project name, taken from the first case
    pub project: String,

    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,

    pub summary: TestSummary,

    /// One entry per case, in descriptor order
    pub cases: Vec<StoredCase>,

    pub environment: EnvironmentInfo,
}

/// Snapshot of one case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredCase {
    pub module: String,
    pub title: String,
    pub priority: Priority,
    pub record: ExecutionRecord,
}

impl StoredCase {
    pub fn from_case(case: &TestCase) -> Self {
        Self {
            module: case.meta().module.clone(),
            title: case.display_name(),
            priority: case.priority(),
            record: case.record(),
        }
    }
}

/// Host the run executed on
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn capture(
        cases: &[Arc<TestCase>],
        summary: TestSummary,
        started_at: Option<DateTime<Local>>,
        finished_at: Option<DateTime<Local>>,
    ) -> Self {
        let project = cases
            .first()
            .map(|c| c.meta().project.clone())
            .unwrap_or_default();

        Self {
            project,
            started_at,
            finished_at,
            summary,
            cases: cases.iter().map(|c| StoredCase::from_case(c)).collect(),
            environment: EnvironmentInfo::default(),
        }
    }

    /// Elapsed wall-clock time of the run
    pub fn elapsed(&self) -> std::time::Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => std::time::Duration::ZERO,
        }
    }

    /// Load a run previously exported as JSON
    pub fn load(path: &Path) -> Result<Self, RecorderError> {
        let file = File::open(path).map_err(|source| RecorderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Export the run to a file
    pub fn export(&self, path: &Path, format: ExportFormat) -> Result<(), RecorderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecorderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        match format {
            ExportFormat::Json => {
                let file = File::create(path).map_err(|source| RecorderError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, self)?;
                writer.flush().map_err(|source| RecorderError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record([
                    "module",
                    "title",
                    "priority",
                    "result",
                    "attempts",
                    "start_time",
                    "stop_time",
                    "duration_ms",
                    "detail",
                ])?;

                for case in &self.cases {
                    let record = &case.record;
                    writer.write_record([
                        case.module.clone(),
                        case.title.clone(),
                        case.priority.to_string(),
                        record.result.to_string(),
                        record.attempts.to_string(),
                        record.start_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                        record.stop_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                        record
                            .duration_ms()
                            .map(|d| d.to_string())
                            .unwrap_or_default(),
                        record.detail.clone(),
                    ])?;
                }
                writer.flush().map_err(|source| RecorderError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

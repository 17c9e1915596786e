//! Recorder contract
//!
//! The engine reports every lifecycle transition to a [`Recorder`] and asks it
//! for aggregation and a report once the run has drained.

mod default;

pub use default::{DefaultRecorder, ReportArtifacts};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{CaseResult, TestCase, TestSummary};

/// Recorder errors
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("no test cases are attached to the recorder")]
    NoRecords,

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Observer of a test run
///
/// `start_run` and `stop_run` may be called concurrently for different cases,
/// never for the same case.
pub trait Recorder: Send + Sync {
    /// Attach the full case list and stamp the run start
    fn begin_run(&self, cases: &[Arc<TestCase>]);

    /// Move the case to `Executing` and stamp its start
    fn start_run(&self, case: &TestCase);

    /// Store the terminal result of the current attempt
    fn stop_run(&self, case: &TestCase, result: CaseResult, detail: &str);

    /// Stamp the run end; called again after a retry pass
    fn end_run(&self);

    /// Recount all records. Idempotent for unchanged records.
    fn calculate_test_result(&self) -> Result<TestSummary, RecorderError>;

    /// Emit the report. Must not mutate records.
    fn gen_test_report(&self) -> Result<(), RecorderError>;
}

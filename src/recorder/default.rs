//! Default recorder
//!
//! Keeps run timing, logs adverse results and renders the text summary plus
//! optional HTML, JSON and CSV artifacts.

use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, info_span, Span};

use super::{Recorder, RecorderError};
use crate::models::{CaseResult, TestCase, TestSummary};
use crate::results::{ExportFormat, ReportGenerator, StoredRun};

/// Files written by [`DefaultRecorder::gen_test_report`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

#[derive(Default)]
struct RunState {
    cases: Vec<Arc<TestCase>>,
    started_at: Option<DateTime<Local>>,
    finished_at: Option<DateTime<Local>>,
    summary: TestSummary,
}

/// Recorder that writes the summary to a writer and artifacts to disk
pub struct DefaultRecorder {
    span: Span,
    state: Mutex<RunState>,
    writer: Mutex<Box<dyn Write + Send>>,
    artifacts: ReportArtifacts,
}

impl DefaultRecorder {
    /// Recorder printing to stdout, logging within a `recorder` span
    pub fn new() -> Self {
        Self {
            span: info_span!("recorder"),
            state: Mutex::new(RunState::default()),
            writer: Mutex::new(Box::new(std::io::stdout())),
            artifacts: ReportArtifacts::default(),
        }
    }

    /// Span every adverse result is logged in
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.writer = Mutex::new(Box::new(writer));
        self
    }

    pub fn with_artifacts(mut self, artifacts: ReportArtifacts) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Summary from the last `calculate_test_result`
    pub fn summary(&self) -> TestSummary {
        self.state().summary.clone()
    }

    /// Freeze the current records
    pub fn snapshot(&self) -> Result<StoredRun, RecorderError> {
        let state = self.state();
        if state.cases.is_empty() {
            return Err(RecorderError::NoRecords);
        }
        Ok(StoredRun::capture(
            &state.cases,
            state.summary.clone(),
            state.started_at,
            state.finished_at,
        ))
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DefaultRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for DefaultRecorder {
    fn begin_run(&self, cases: &[Arc<TestCase>]) {
        let mut state = self.state();
        state.cases = cases.to_vec();
        state.started_at = Some(Local::now());
        state.finished_at = None;
    }

    fn start_run(&self, case: &TestCase) {
        case.mark_started();
        let _enter = self.span.enter();
        debug!(case = %case.display_name(), "started");
    }

    fn stop_run(&self, case: &TestCase, result: CaseResult, detail: &str) {
        case.mark_stopped(result, detail);

        let _enter = self.span.enter();
        let name = case.display_name();
        match result {
            CaseResult::Fail => error!(case = %name, "failed: {detail}"),
            CaseResult::Block => error!(case = %name, "blocked: {detail}"),
            CaseResult::Timeout => error!(case = %name, "timed out: {detail}"),
            _ => debug!(case = %name, result = %result, "stopped"),
        }
    }

    fn end_run(&self) {
        self.state().finished_at = Some(Local::now());
    }

    fn calculate_test_result(&self) -> Result<TestSummary, RecorderError> {
        let mut state = self.state();
        if state.cases.is_empty() {
            return Err(RecorderError::NoRecords);
        }
        let summary = TestSummary::from_results(state.cases.iter().map(|c| c.result()));
        state.summary = summary.clone();
        Ok(summary)
    }

    fn gen_test_report(&self) -> Result<(), RecorderError> {
        let run = self.snapshot()?;

        {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.write_all(ReportGenerator::text(&run).as_bytes())?;
            writer.flush()?;
        }

        if let Some(path) = &self.artifacts.html {
            write_file(path, &ReportGenerator::html(&run))?;
            info!("HTML report written to {}", path.display());
        }
        if let Some(path) = &self.artifacts.json {
            run.export(path, ExportFormat::Json)?;
        }
        if let Some(path) = &self.artifacts.csv {
            run.export(path, ExportFormat::Csv)?;
        }

        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), RecorderError> {
    let io_err = |source| RecorderError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)
}

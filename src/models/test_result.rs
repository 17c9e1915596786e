//! Test result models
//!
//! Defines result kinds, per-case execution records and run summaries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a single test case
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseResult {
    #[default]
    NotExecuted,
    Executing,
    Pass,
    Fail,
    Block,
    Timeout,
}

impl CaseResult {
    pub fn symbol(&self) -> &'static str {
        match self {
            CaseResult::NotExecuted => "○",
            CaseResult::Executing => "…",
            CaseResult::Pass => "✓",
            CaseResult::Fail => "✗",
            CaseResult::Block => "!",
            CaseResult::Timeout => "⏱",
        }
    }

    /// Human readable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            CaseResult::NotExecuted => "Not Executed",
            CaseResult::Executing => "Executing",
            CaseResult::Pass => "Pass",
            CaseResult::Fail => "Fail",
            CaseResult::Block => "Block",
            CaseResult::Timeout => "Timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CaseResult::Pass)
    }

    /// Outcome of a concluded attempt
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseResult::Pass | CaseResult::Fail | CaseResult::Block | CaseResult::Timeout
        )
    }

    /// Fail, Block and Timeout are reported on the error channel
    pub fn is_adverse(&self) -> bool {
        matches!(
            self,
            CaseResult::Fail | CaseResult::Block | CaseResult::Timeout
        )
    }
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseResult::NotExecuted => write!(f, "NOT_EXECUTED"),
            CaseResult::Executing => write!(f, "EXECUTING"),
            CaseResult::Pass => write!(f, "PASS"),
            CaseResult::Fail => write!(f, "FAIL"),
            CaseResult::Block => write!(f, "BLOCK"),
            CaseResult::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Mutable per-case state for the current attempt
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub result: CaseResult,
    pub start_time: Option<DateTime<Local>>,
    pub stop_time: Option<DateTime<Local>>,
    pub detail: String,
    /// Number of attempts started for this case
    pub attempts: u32,
}

impl ExecutionRecord {
    /// Enter `Executing` for a new attempt
    pub fn begin(&mut self, at: DateTime<Local>) {
        self.result = CaseResult::Executing;
        self.start_time = Some(at);
        self.stop_time = None;
        self.detail.clear();
        self.attempts += 1;
    }

    /// Conclude the current attempt
    pub fn conclude(&mut self, result: CaseResult, detail: impl Into<String>, at: DateTime<Local>) {
        debug_assert!(result.is_terminal(), "non-terminal result {result:?}");
        self.result = result;
        self.detail = detail.into();
        self.stop_time = Some(at);
    }

    /// Wall-clock duration of the last attempt, if it concluded
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.stop_time) {
            (Some(start), Some(stop)) => Some((stop - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Aggregate counts over all records of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub timed_out: usize,
    pub not_executed: usize,
}

impl TestSummary {
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = CaseResult>,
    {
        let mut summary = Self::default();
        for result in results {
            summary.total += 1;
            match result {
                CaseResult::Pass => summary.passed += 1,
                CaseResult::Fail => summary.failed += 1,
                CaseResult::Block => summary.blocked += 1,
                CaseResult::Timeout => summary.timed_out += 1,
                CaseResult::NotExecuted => summary.not_executed += 1,
                // Only observable if aggregation races a live attempt
                CaseResult::Executing => {}
            }
        }
        summary
    }

    /// Percentage of `count` in the total, rounded to two decimals
    pub fn percentage(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            round2(count as f64 / self.total as f64 * 100.0)
        }
    }

    pub fn pass_rate(&self) -> f64 {
        self.percentage(self.passed)
    }

    /// Remainder after the four executed kinds, so the column always sums to 100
    pub fn not_executed_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round2(
            100.0
                - self.percentage(self.passed)
                - self.percentage(self.failed)
                - self.percentage(self.blocked)
                - self.percentage(self.timed_out),
        )
    }

    /// Rows of (result, count, percentage) in report order
    pub fn rows(&self) -> Vec<(CaseResult, usize, f64)> {
        vec![
            (CaseResult::Pass, self.passed, self.percentage(self.passed)),
            (CaseResult::Fail, self.failed, self.percentage(self.failed)),
            (CaseResult::Block, self.blocked, self.percentage(self.blocked)),
            (
                CaseResult::Timeout,
                self.timed_out,
                self.percentage(self.timed_out),
            ),
            (
                CaseResult::NotExecuted,
                self.not_executed,
                self.not_executed_rate(),
            ),
        ]
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Block: {} | Timeout: {} | Not Executed: {}",
            self.total,
            self.passed,
            self.failed,
            self.blocked,
            self.timed_out,
            self.not_executed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle() {
        let mut record = ExecutionRecord::default();
        assert_eq!(record.result, CaseResult::NotExecuted);

        record.begin(Local::now());
        assert_eq!(record.result, CaseResult::Executing);
        assert_eq!(record.attempts, 1);

        record.conclude(CaseResult::Fail, "boom", Local::now());
        assert_eq!(record.result, CaseResult::Fail);
        assert_eq!(record.detail, "boom");
        assert!(record.duration_ms().is_some());

        record.begin(Local::now());
        assert_eq!(record.result, CaseResult::Executing);
        assert!(record.detail.is_empty());
        assert_eq!(record.attempts, 2);
    }

    #[test]
    fn test_summary_counts() {
        let summary = TestSummary::from_results(vec![
            CaseResult::Pass,
            CaseResult::Pass,
            CaseResult::Fail,
            CaseResult::Timeout,
            CaseResult::NotExecuted,
            CaseResult::Block,
        ]);
        assert_eq!(summary.total, 6);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.blocked, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.not_executed, 1);
        assert!(!summary.is_all_passed());
    }

    #[test]
    fn test_summary_percentages() {
        let summary = TestSummary::from_results(vec![
            CaseResult::Pass,
            CaseResult::Pass,
            CaseResult::Fail,
        ]);
        assert_eq!(summary.pass_rate(), 66.67);
        assert_eq!(summary.percentage(summary.failed), 33.33);
        assert_eq!(summary.not_executed_rate(), 0.0);

        let empty = TestSummary::default();
        assert_eq!(empty.pass_rate(), 0.0);
        assert_eq!(empty.not_executed_rate(), 0.0);
    }

    #[test]
    fn test_adverse_results() {
        assert!(CaseResult::Fail.is_adverse());
        assert!(CaseResult::Block.is_adverse());
        assert!(CaseResult::Timeout.is_adverse());
        assert!(!CaseResult::Pass.is_adverse());
        assert!(!CaseResult::Executing.is_terminal());
    }
}

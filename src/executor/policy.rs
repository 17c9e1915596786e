//! Stop and retry policies
//!
//! The [`PolicyEngine`] is shared by every worker of a run. It owns the stop
//! flag, the only state more than one worker writes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::models::{CaseResult, Priority, TestSummary};

/// When a non-passing outcome halts further dispatch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopStrategy {
    #[default]
    AllCompleted,
    FirstNotPass,
    FirstP0NotPass,
}

impl StopStrategy {
    /// Accepts names in kebab, snake or upper case, or the numeric codes 0-2
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "all-completed" | "0" => Some(StopStrategy::AllCompleted),
            "first-not-pass" | "1" => Some(StopStrategy::FirstNotPass),
            "first-p0-not-pass" | "2" => Some(StopStrategy::FirstP0NotPass),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StopStrategy::AllCompleted => "run every case",
            StopStrategy::FirstNotPass => "stop at the first case that does not pass",
            StopStrategy::FirstP0NotPass => "stop at the first P0 case that does not pass",
        }
    }

    pub fn all() -> Vec<StopStrategy> {
        vec![
            StopStrategy::AllCompleted,
            StopStrategy::FirstNotPass,
            StopStrategy::FirstP0NotPass,
        ]
    }

    /// Whether a non-passing case of `priority` trips the stop flag
    pub fn trips_on(&self, priority: Priority) -> bool {
        *self == StopStrategy::FirstNotPass
            || (*self == StopStrategy::FirstP0NotPass && priority == Priority::P0)
    }
}

impl fmt::Display for StopStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopStrategy::AllCompleted => write!(f, "all-completed"),
            StopStrategy::FirstNotPass => write!(f, "first-not-pass"),
            StopStrategy::FirstP0NotPass => write!(f, "first-p0-not-pass"),
        }
    }
}

/// When and how a non-passing case is re-attempted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    #[default]
    NotRerun,
    /// Re-run a failing case once, right away, in the same worker
    RerunNow,
    /// One extra pass over every non-passing case after the first pass
    RerunLast,
}

impl RetryStrategy {
    /// Accepts names in kebab, snake or upper case, or the numeric codes 0-2
    pub fn from_str(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "not-rerun" | "0" => Some(RetryStrategy::NotRerun),
            "rerun-now" | "1" => Some(RetryStrategy::RerunNow),
            "rerun-last" | "2" => Some(RetryStrategy::RerunLast),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RetryStrategy::NotRerun => "never retry",
            RetryStrategy::RerunNow => "retry a failing case once, immediately",
            RetryStrategy::RerunLast => "retry all failing cases once, after the first pass",
        }
    }

    pub fn all() -> Vec<RetryStrategy> {
        vec![
            RetryStrategy::NotRerun,
            RetryStrategy::RerunNow,
            RetryStrategy::RerunLast,
        ]
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryStrategy::NotRerun => write!(f, "not-rerun"),
            RetryStrategy::RerunNow => write!(f, "rerun-now"),
            RetryStrategy::RerunLast => write!(f, "rerun-last"),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace('_', "-")
}

/// What a worker does after an attempt concluded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Keep the result, move on
    Continue,
    /// Attempt the same case once more
    RetryNow,
    /// The stop flag is now set; no retry
    Stop,
}

/// Stop and retry decisions for one run
#[derive(Debug)]
pub struct PolicyEngine {
    stop: StopStrategy,
    retry: RetryStrategy,
    stopped: AtomicBool,
}

impl PolicyEngine {
    pub fn new(stop: StopStrategy, retry: RetryStrategy) -> Self {
        Self {
            stop,
            retry,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop_strategy(&self) -> StopStrategy {
        self.stop
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        self.retry
    }

    /// Dispatch gate checked by every worker before starting a case
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Evaluate a concluded attempt.
    ///
    /// The stop strategy is consulted first; once the flag is set no case is
    /// retried. `retryable` is false for an attempt that already is a retry.
    pub fn on_outcome(
        &self,
        title: &str,
        priority: Priority,
        result: CaseResult,
        retryable: bool,
    ) -> Decision {
        if result.is_success() {
            return Decision::Continue;
        }

        if self.stop.trips_on(priority) {
            self.trip(title, result);
            return Decision::Stop;
        }

        if retryable && self.retry == RetryStrategy::RerunNow && !self.is_stopped() {
            Decision::RetryNow
        } else {
            Decision::Continue
        }
    }

    /// Whether the scheduler runs the single batch-retry pass
    pub fn wants_rerun_pass(&self, summary: &TestSummary) -> bool {
        self.retry == RetryStrategy::RerunLast
            && !self.is_stopped()
            && summary.passed < summary.total
    }

    fn trip(&self, title: &str, result: CaseResult) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            warn!(
                "Stop strategy '{}' triggered by '{}' ({}); no new cases will start",
                self.stop, title, result
            );
        }
    }
}

//! Execution slot
//!
//! Runs one case attempt under a timeout supervisor and classifies the
//! outcome.
//!
//! The lifecycle (setup, action, teardown) runs on its own OS thread and
//! reports back over a oneshot channel. The slot waits at most the configured
//! timeout. A thread that overruns is *not* killed: the slot records Timeout
//! and drops the join handle, so the thread keeps running unsupervised until
//! the case returns on its own. While it does, it occupies a thread outside
//! the pool's concurrency budget.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, info};

use super::policy::{Decision, PolicyEngine};
use crate::models::{CaseError, CaseResult, TestCase};
use crate::recorder::Recorder;
use crate::utils::Timer;

/// Lifecycle step of a case
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Setup,
    Action,
    Teardown,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Setup => write!(f, "setup"),
            Step::Action => write!(f, "action"),
            Step::Teardown => write!(f, "teardown"),
        }
    }
}

/// What the case thread reports back
#[derive(Debug)]
pub enum LifecycleOutcome {
    Completed,
    Faulted { step: Step, error: CaseError },
    Panicked { step: Step, message: String },
}

/// How waiting for the case thread ended
#[derive(Debug)]
pub enum Wait {
    Finished(LifecycleOutcome),
    /// The thread went away without reporting
    Lost,
    /// The timeout elapsed first
    Elapsed,
}

/// Classified result of one attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub result: CaseResult,
    pub detail: String,
}

impl Verdict {
    fn new(result: CaseResult, detail: impl Into<String>) -> Self {
        Self {
            result,
            detail: detail.into(),
        }
    }
}

/// Classify an attempt. A duration equal to the bound is not a timeout.
pub fn classify(wait: Wait, elapsed: Duration, timeout_secs: u64) -> Verdict {
    let overran = elapsed > Duration::from_secs(timeout_secs);

    match wait {
        Wait::Elapsed => timed_out(timeout_secs),
        _ if overran => timed_out(timeout_secs),
        Wait::Finished(LifecycleOutcome::Completed) => Verdict::new(CaseResult::Pass, ""),
        Wait::Finished(LifecycleOutcome::Faulted { step, error }) => {
            let result = if error.is_assertion() {
                CaseResult::Fail
            } else {
                CaseResult::Block
            };
            Verdict::new(result, format!("{step} failed: {}", error.diagnostic()))
        }
        Wait::Finished(LifecycleOutcome::Panicked { step, message }) => {
            Verdict::new(CaseResult::Block, format!("{step} panicked: {message}"))
        }
        Wait::Lost => Verdict::new(
            CaseResult::Block,
            "case thread exited without reporting an outcome",
        ),
    }
}

fn timed_out(timeout_secs: u64) -> Verdict {
    Verdict::new(
        CaseResult::Timeout,
        format!("execution exceeded the timeout of {timeout_secs} seconds"),
    )
}

/// Run setup, action and teardown, stopping at the first fault
fn run_lifecycle(case: &TestCase) -> LifecycleOutcome {
    let ctx = case.context();
    let body = case.body();

    for step in [Step::Setup, Step::Action, Step::Teardown] {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match step {
            Step::Setup => body.setup(&ctx),
            Step::Action => body.action(&ctx),
            Step::Teardown => body.teardown(&ctx),
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return LifecycleOutcome::Faulted { step, error },
            Err(payload) => {
                return LifecycleOutcome::Panicked {
                    step,
                    message: panic_message(payload.as_ref()),
                }
            }
        }
    }

    LifecycleOutcome::Completed
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Start the lifecycle on a detached thread
fn spawn_lifecycle(case: &Arc<TestCase>) -> std::io::Result<oneshot::Receiver<LifecycleOutcome>> {
    let (tx, rx) = oneshot::channel();
    let case = Arc::clone(case);

    thread::Builder::new()
        .name(format!("case-{}", case.title().replace('\0', "")))
        .spawn(move || {
            let outcome = run_lifecycle(&case);
            // The slot may have stopped listening after a timeout
            let _ = tx.send(outcome);
        })?;

    Ok(rx)
}

/// Execute one attempt of `case`, notifying `recorder` before and after
pub async fn execute(case: &Arc<TestCase>, recorder: &dyn Recorder, timeout_secs: u64) -> Verdict {
    recorder.start_run(case);

    let timer = Timer::start(case.display_name());
    let verdict = match spawn_lifecycle(case) {
        Ok(rx) => {
            let wait = match time::timeout(Duration::from_secs(timeout_secs), rx).await {
                Ok(Ok(outcome)) => Wait::Finished(outcome),
                Ok(Err(_)) => Wait::Lost,
                Err(_) => Wait::Elapsed,
            };
            classify(wait, timer.stop(), timeout_secs)
        }
        Err(e) => Verdict::new(
            CaseResult::Block,
            format!("failed to start case thread: {e}"),
        ),
    };

    recorder.stop_run(case, verdict.result, &verdict.detail);
    verdict
}

/// What a worker did with its case
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotOutcome {
    /// The stop flag was set before the case started
    Skipped,
    Finished { result: CaseResult, attempts: u32 },
}

/// Worker body: gate on the stop flag, execute, consult the policies and
/// retry once when `RerunNow` asks for it
pub async fn run_slot(
    case: Arc<TestCase>,
    recorder: Arc<dyn Recorder>,
    policy: Arc<PolicyEngine>,
    timeout_secs: u64,
) -> SlotOutcome {
    if policy.is_stopped() {
        debug!("Skipping {} (stop flag set)", case.display_name());
        return SlotOutcome::Skipped;
    }

    let mut verdict = execute(&case, recorder.as_ref(), timeout_secs).await;
    let mut attempts = 1;

    if policy.on_outcome(case.title(), case.priority(), verdict.result, true) == Decision::RetryNow
    {
        info!(
            "Retrying {} immediately after {}",
            case.display_name(),
            verdict.result
        );
        verdict = execute(&case, recorder.as_ref(), timeout_secs).await;
        attempts += 1;
        policy.on_outcome(case.title(), case.priority(), verdict.result, false);
    }

    SlotOutcome::Finished {
        result: verdict.result,
        attempts,
    }
}

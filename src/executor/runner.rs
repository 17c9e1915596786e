//! Test execution runner
//!
//! Dispatches cases onto a bounded worker pool, applies the stop and retry
//! policies, and drives the recorder through the run.

use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::policy::{PolicyEngine, RetryStrategy, StopStrategy};
use super::slot::{run_slot, SlotOutcome};
use crate::models::{CaseResult, TestCase, TestSummary};
use crate::recorder::{Recorder, RecorderError};
use crate::utils::Stopwatch;

/// Default per-case timeout: one hour
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Engine errors
#[derive(Error, Debug)]
pub enum RunError {
    #[error("no executable test cases: every case is either missing or already passed")]
    NoCases,

    #[error("timeout must be at least 1 second")]
    InvalidTimeout,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("recorder failed: {0}")]
    Recorder(#[from] RecorderError),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("worker pool closed during dispatch")]
    PoolClosed,
}

/// Run options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub stop: StopStrategy,
    pub retry: RetryStrategy,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stop: StopStrategy::default(),
            retry: RetryStrategy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: 1,
        }
    }
}

impl RunOptions {
    pub fn with_stop(mut self, stop: StopStrategy) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.timeout_secs == 0 {
            return Err(RunError::InvalidTimeout);
        }
        if self.concurrency == 0 {
            return Err(RunError::InvalidConcurrency);
        }
        Ok(())
    }
}

/// Per-pass counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PassStats {
    executed: usize,
    skipped: usize,
    retried: usize,
}

/// Test runner
pub struct TestRunner {
    options: RunOptions,
}

impl TestRunner {
    /// Create a runner; rejects a zero timeout or zero concurrency
    pub fn new(options: RunOptions) -> Result<Self, RunError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run every case that has not passed yet and return the final summary.
    ///
    /// Blocks until every dispatched case is accounted for. Cases skipped
    /// after the stop flag was set stay `NotExecuted`.
    pub async fn run(
        &self,
        cases: &[Arc<TestCase>],
        recorder: Arc<dyn Recorder>,
    ) -> Result<TestSummary, RunError> {
        let pending = not_passed(cases);
        if pending.is_empty() {
            return Err(RunError::NoCases);
        }

        info!(
            "Starting run of {} cases ({} listed) - stop: {}, retry: {}, timeout: {}s, \
             parallel: {}",
            pending.len(),
            cases.len(),
            self.options.stop,
            self.options.retry,
            self.options.timeout_secs,
            self.options.concurrency
        );

        recorder.begin_run(cases);
        let policy = Arc::new(PolicyEngine::new(self.options.stop, self.options.retry));
        let mut stopwatch = Stopwatch::new();

        let stats = self.run_pass(&pending, &recorder, &policy).await?;
        stopwatch.lap("pass 1");
        self.log_pass(1, &stats);

        recorder.end_run();
        let mut summary = recorder.calculate_test_result()?;

        if policy.wants_rerun_pass(&summary) {
            let rerun = not_passed(cases);
            info!("Re-running {} non-passing cases", rerun.len());

            let stats = self.run_pass(&rerun, &recorder, &policy).await?;
            stopwatch.lap("pass 2");
            self.log_pass(2, &stats);

            recorder.end_run();
            summary = recorder.calculate_test_result()?;
        }

        recorder.gen_test_report()?;

        info!(
            "Run completed in {}ms ({}) - Pass: {}/{} ({:.1}%)",
            stopwatch.total().as_millis(),
            stopwatch.format(),
            summary.passed,
            summary.total,
            summary.pass_rate()
        );

        Ok(summary)
    }

    /// Dispatch `cases` in order and wait for all of them
    async fn run_pass(
        &self,
        cases: &[Arc<TestCase>],
        recorder: &Arc<dyn Recorder>,
        policy: &Arc<PolicyEngine>,
    ) -> Result<PassStats, RunError> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut handles = Vec::with_capacity(cases.len());

        for case in cases {
            // Acquired here, in list order, so submission order is preserved
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| RunError::PoolClosed)?;

            let case = Arc::clone(case);
            let recorder = Arc::clone(recorder);
            let policy = Arc::clone(policy);
            let timeout_secs = self.options.timeout_secs;

            debug!("Dispatching {}", case.display_name());
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_slot(case, recorder, policy, timeout_secs).await
            }));
        }

        let mut stats = PassStats::default();
        let mut worker_error = None;

        for joined in join_all(handles).await {
            match joined {
                Ok(SlotOutcome::Skipped) => stats.skipped += 1,
                Ok(SlotOutcome::Finished { attempts, .. }) => {
                    stats.executed += 1;
                    stats.retried += attempts.saturating_sub(1) as usize;
                }
                Err(e) => {
                    worker_error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        match worker_error {
            Some(message) => Err(RunError::Worker(message)),
            None => Ok(stats),
        }
    }

    fn log_pass(&self, pass: u32, stats: &PassStats) {
        info!(
            "Pass {} finished: {} executed, {} retried immediately",
            pass, stats.executed, stats.retried
        );
        if stats.skipped > 0 {
            warn!(
                "Pass {}: {} cases not executed after the stop strategy triggered",
                pass, stats.skipped
            );
        }
    }
}

fn not_passed(cases: &[Arc<TestCase>]) -> Vec<Arc<TestCase>> {
    cases
        .iter()
        .filter(|c| c.result() != CaseResult::Pass)
        .cloned()
        .collect()
}

/// Run `cases` with the given policies and limits
pub async fn run_tests(
    cases: &[Arc<TestCase>],
    recorder: Arc<dyn Recorder>,
    stop: StopStrategy,
    retry: RetryStrategy,
    timeout_secs: u64,
    concurrency: usize,
) -> Result<TestSummary, RunError> {
    let options = RunOptions {
        stop,
        retry,
        timeout_secs,
        concurrency,
    };
    TestRunner::new(options)?.run(cases, recorder).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseError, CaseMeta, Priority};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Event {
        Begin(usize),
        Start(String),
        Stop(String, CaseResult),
        End,
        Calculate,
        Report,
    }

    /// Recorder keeping every call in memory
    #[derive(Default)]
    struct EventRecorder {
        events: Mutex<Vec<Event>>,
        cases: Mutex<Vec<Arc<TestCase>>>,
    }

    impl EventRecorder {
        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn starts(&self, title: &str) -> usize {
            self.events()
                .iter()
                .filter(|e| matches!(e, Event::Start(t) if t == title))
                .count()
        }

        fn count(&self, event: &Event) -> usize {
            self.events().iter().filter(|e| *e == event).count()
        }
    }

    impl Recorder for EventRecorder {
        fn begin_run(&self, cases: &[Arc<TestCase>]) {
            *self.cases.lock().unwrap() = cases.to_vec();
            self.push(Event::Begin(cases.len()));
        }

        fn start_run(&self, case: &TestCase) {
            case.mark_started();
            self.push(Event::Start(case.title().to_string()));
        }

        fn stop_run(&self, case: &TestCase, result: CaseResult, detail: &str) {
            case.mark_stopped(result, detail);
            self.push(Event::Stop(case.title().to_string(), result));
        }

        fn end_run(&self) {
            self.push(Event::End);
        }

        fn calculate_test_result(&self) -> Result<TestSummary, RecorderError> {
            self.push(Event::Calculate);
            let cases = self.cases.lock().unwrap();
            if cases.is_empty() {
                return Err(RecorderError::NoRecords);
            }
            Ok(TestSummary::from_results(cases.iter().map(|c| c.result())))
        }

        fn gen_test_report(&self) -> Result<(), RecorderError> {
            self.push(Event::Report);
            Ok(())
        }
    }

    fn passing(title: &str) -> Arc<TestCase> {
        Arc::new(TestCase::from_fn(CaseMeta::new(title), |_| Ok(())))
    }

    fn failing(title: &str, priority: Priority) -> Arc<TestCase> {
        Arc::new(TestCase::from_fn(
            CaseMeta::new(title).with_priority(priority),
            |_| Err(CaseError::assertion("expected value")),
        ))
    }

    /// Fails on its first `failures` attempts, passes afterwards
    fn flaky(title: &str, failures: u32) -> Arc<TestCase> {
        let calls = AtomicU32::new(0);
        Arc::new(TestCase::from_fn(CaseMeta::new(title), move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(CaseError::assertion("not yet"))
            } else {
                Ok(())
            }
        }))
    }

    fn sleeping(title: &str, millis: u64) -> Arc<TestCase> {
        Arc::new(TestCase::from_fn(CaseMeta::new(title), move |_| {
            thread::sleep(Duration::from_millis(millis));
            Ok(())
        }))
    }

    async fn run(
        cases: &[Arc<TestCase>],
        options: RunOptions,
    ) -> (Result<TestSummary, RunError>, Arc<EventRecorder>) {
        let recorder = Arc::new(EventRecorder::default());
        let result = TestRunner::new(options)
            .unwrap()
            .run(cases, recorder.clone())
            .await;
        (result, recorder)
    }

    #[tokio::test]
    async fn test_all_pass() {
        let cases = vec![passing("a"), passing("b"), passing("c")];
        let (result, recorder) = run(&cases, RunOptions::default()).await;
        let summary = result.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 3);
        assert_eq!(summary.failed, 0);

        let events = recorder.events();
        assert_eq!(events.first(), Some(&Event::Begin(3)));
        assert_eq!(events.last(), Some(&Event::Report));
        assert_eq!(recorder.count(&Event::End), 1);
        assert_eq!(recorder.count(&Event::Calculate), 1);
    }

    #[tokio::test]
    async fn test_serial_runs_in_list_order() {
        let cases = vec![passing("a"), passing("b"), passing("c")];
        let (_, recorder) = run(&cases, RunOptions::default()).await;

        let starts: Vec<_> = recorder
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_not_pass_stops_dispatch() {
        let cases = vec![
            failing("a", Priority::P2),
            passing("b"),
            passing("c"),
        ];
        let options = RunOptions::default().with_stop(StopStrategy::FirstNotPass);
        let (result, recorder) = run(&cases, options).await;
        let summary = result.unwrap();

        assert_eq!(cases[0].result(), CaseResult::Fail);
        assert_eq!(cases[1].result(), CaseResult::NotExecuted);
        assert_eq!(cases[2].result(), CaseResult::NotExecuted);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_executed, 2);
        assert_eq!(recorder.starts("b"), 0);
    }

    #[tokio::test]
    async fn test_first_p0_not_pass_ignores_lower_priorities() {
        let cases = vec![
            failing("minor", Priority::P1),
            passing("between"),
            failing("smoke", Priority::P0),
            passing("after"),
        ];
        let options = RunOptions::default().with_stop(StopStrategy::FirstP0NotPass);
        let (result, _) = run(&cases, options).await;
        let summary = result.unwrap();

        assert_eq!(cases[1].result(), CaseResult::Pass);
        assert_eq!(cases[2].result(), CaseResult::Fail);
        assert_eq!(cases[3].result(), CaseResult::NotExecuted);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.not_executed, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded() {
        let cases = vec![sleeping("slow", 2000)];
        let options = RunOptions::default().with_timeout(1);
        let (result, _) = run(&cases, options).await;
        let summary = result.unwrap();

        assert_eq!(summary.timed_out, 1);
        let record = cases[0].record();
        assert_eq!(record.result, CaseResult::Timeout);
        assert!(record.detail.contains('1'));
    }

    #[tokio::test]
    async fn test_rerun_now_retries_once() {
        let cases = vec![flaky("flaky", 1)];
        let options = RunOptions::default().with_retry(RetryStrategy::RerunNow);
        let (result, recorder) = run(&cases, options).await;

        assert_eq!(result.unwrap().passed, 1);
        assert_eq!(cases[0].result(), CaseResult::Pass);
        assert_eq!(cases[0].record().attempts, 2);
        assert_eq!(recorder.starts("flaky"), 2);

        let flaky_events: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|e| matches!(e, Event::Start(t) | Event::Stop(t, _) if t == "flaky"))
            .collect();
        assert_eq!(
            flaky_events,
            vec![
                Event::Start("flaky".to_string()),
                Event::Stop("flaky".to_string(), CaseResult::Fail),
                Event::Start("flaky".to_string()),
                Event::Stop("flaky".to_string(), CaseResult::Pass),
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_now_never_retries_twice() {
        let cases = vec![flaky("stubborn", 5)];
        let options = RunOptions::default().with_retry(RetryStrategy::RerunNow);
        let (result, recorder) = run(&cases, options).await;

        assert_eq!(result.unwrap().failed, 1);
        assert_eq!(recorder.starts("stubborn"), 2);
    }

    #[tokio::test]
    async fn test_rerun_now_suppressed_by_stop() {
        let cases = vec![flaky("flaky", 1), passing("next")];
        let options = RunOptions::default()
            .with_stop(StopStrategy::FirstNotPass)
            .with_retry(RetryStrategy::RerunNow);
        let (result, recorder) = run(&cases, options).await;

        assert_eq!(result.unwrap().failed, 1);
        assert_eq!(recorder.starts("flaky"), 1);
        assert_eq!(cases[1].result(), CaseResult::NotExecuted);
    }

    #[tokio::test]
    async fn test_rerun_last_runs_one_extra_pass() {
        let cases = vec![passing("steady"), flaky("flaky", 1)];
        let options = RunOptions::default().with_retry(RetryStrategy::RerunLast);
        let (result, recorder) = run(&cases, options).await;
        let summary = result.unwrap();

        assert_eq!(summary.passed, 2);
        assert_eq!(recorder.starts("steady"), 1);
        assert_eq!(recorder.starts("flaky"), 2);
        assert_eq!(recorder.count(&Event::End), 2);
        assert_eq!(recorder.count(&Event::Calculate), 2);
        assert_eq!(recorder.count(&Event::Report), 1);
    }

    #[tokio::test]
    async fn test_rerun_last_never_runs_a_third_pass() {
        let cases = vec![flaky("stubborn", 5)];
        let options = RunOptions::default().with_retry(RetryStrategy::RerunLast);
        let (result, recorder) = run(&cases, options).await;

        assert_eq!(result.unwrap().failed, 1);
        assert_eq!(recorder.starts("stubborn"), 2);
    }

    #[tokio::test]
    async fn test_rerun_last_disabled_after_stop() {
        let cases = vec![failing("a", Priority::P0), passing("b")];
        let options = RunOptions::default()
            .with_stop(StopStrategy::FirstP0NotPass)
            .with_retry(RetryStrategy::RerunLast);
        let (result, recorder) = run(&cases, options).await;

        assert_eq!(result.unwrap().not_executed, 1);
        assert_eq!(recorder.starts("a"), 1);
        assert_eq!(recorder.count(&Event::Calculate), 1);
    }

    #[tokio::test]
    async fn test_passed_cases_are_not_rerun() {
        let done = passing("done");
        done.mark_started();
        done.mark_stopped(CaseResult::Pass, "");
        let cases = vec![done, passing("todo")];

        let (result, recorder) = run(&cases, RunOptions::default()).await;
        assert_eq!(result.unwrap().passed, 2);
        assert_eq!(recorder.starts("done"), 0);
        assert_eq!(recorder.events().first(), Some(&Event::Begin(2)));
    }

    #[tokio::test]
    async fn test_no_eligible_cases() {
        let (result, recorder) = run(&[], RunOptions::default()).await;
        assert!(matches!(result, Err(RunError::NoCases)));
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let recorder: Arc<dyn Recorder> = Arc::new(EventRecorder::default());
        let cases = vec![passing("a")];

        let result = run_tests(
            &cases,
            recorder.clone(),
            StopStrategy::AllCompleted,
            RetryStrategy::NotRerun,
            0,
            1,
        )
        .await;
        assert!(matches!(result, Err(RunError::InvalidTimeout)));

        let result = run_tests(
            &cases,
            recorder,
            StopStrategy::AllCompleted,
            RetryStrategy::NotRerun,
            10,
            0,
        )
        .await;
        assert!(matches!(result, Err(RunError::InvalidConcurrency)));
        assert_eq!(cases[0].result(), CaseResult::NotExecuted);
    }

    #[tokio::test]
    async fn test_concurrent_cases_overlap() {
        let cases: Vec<_> = (0..4).map(|i| sleeping(&format!("c{i}"), 300)).collect();
        let options = RunOptions::default().with_concurrency(4);

        let start = Instant::now();
        let (result, _) = run(&cases, options).await;
        let elapsed = start.elapsed();

        assert_eq!(result.unwrap().passed, 4);
        assert!(elapsed < Duration::from_millis(1200), "took {elapsed:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_first_not_pass_lets_running_cases_finish() {
        let cases = vec![
            Arc::new(TestCase::from_fn(CaseMeta::new("early-fail"), |_| {
                thread::sleep(Duration::from_millis(200));
                Err(CaseError::assertion("broken"))
            })),
            sleeping("slow-pass", 600),
            passing("queued-1"),
            passing("queued-2"),
        ];
        let options = RunOptions::default()
            .with_stop(StopStrategy::FirstNotPass)
            .with_concurrency(2);
        let (result, recorder) = run(&cases, options).await;
        let summary = result.unwrap();

        let results: Vec<_> = cases.iter().map(|c| c.result()).collect();
        assert_eq!(
            results,
            vec![
                CaseResult::Fail,
                CaseResult::Pass,
                CaseResult::NotExecuted,
                CaseResult::NotExecuted,
            ]
        );
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.not_executed, 2);
        assert_eq!(
            recorder.count(&Event::Stop("slow-pass".to_string(), CaseResult::Pass)),
            1
        );
        assert_eq!(recorder.starts("queued-1"), 0);
        assert_eq!(recorder.starts("queued-2"), 0);
    }

    #[tokio::test]
    async fn test_recorder_errors_propagate() {
        struct Forgetful;

        impl Recorder for Forgetful {
            fn begin_run(&self, _cases: &[Arc<TestCase>]) {}
            fn start_run(&self, _case: &TestCase) {}
            fn stop_run(&self, _case: &TestCase, _result: CaseResult, _detail: &str) {}
            fn end_run(&self) {}
            fn calculate_test_result(&self) -> Result<TestSummary, RecorderError> {
                Err(RecorderError::NoRecords)
            }
            fn gen_test_report(&self) -> Result<(), RecorderError> {
                Ok(())
            }
        }

        let runner = TestRunner::new(RunOptions::default()).unwrap();
        let result = runner.run(&[passing("a")], Arc::new(Forgetful)).await;
        assert!(matches!(
            result,
            Err(RunError::Recorder(RecorderError::NoRecords))
        ));
    }
}

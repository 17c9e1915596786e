use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{
    CaseBody, CaseContext, CaseError, CaseMeta, FnCase, Priority, StepResult, TestCase,
};
use crate::task::{TaskError, TestTask};
use crate::{verify, verify_eq};

const PROJECT: &str = "Smoke";

/// Key-value store case with a fixture built in setup and dropped in teardown
#[derive(Default)]
struct StoreRoundTrip {
    store: Mutex<Option<HashMap<String, String>>>,
}

impl CaseBody for StoreRoundTrip {
    fn setup(&self, _ctx: &CaseContext<'_>) -> StepResult {
        *self.store.lock().unwrap_or_else(PoisonError::into_inner) = Some(HashMap::new());
        Ok(())
    }

    fn action(&self, ctx: &CaseContext<'_>) -> StepResult {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        let store = guard
            .as_mut()
            .ok_or_else(|| CaseError::other("store fixture missing"))?;

        store.insert(ctx.title().to_string(), "value".to_string());
        verify_eq!(store.get(ctx.title()).map(String::as_str), Some("value"));
        Ok(())
    }

    fn teardown(&self, _ctx: &CaseContext<'_>) -> StepResult {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

fn meta(module: &str, title: &str, priority: Priority) -> CaseMeta {
    CaseMeta::new(title)
        .with_project(PROJECT)
        .with_module(module)
        .with_priority(priority)
}

pub(super) fn build() -> Result<TestTask, TaskError> {
    let mut task = TestTask::new("smoke");

    task.add_case(TestCase::from_fn(
        meta("math", "addition", Priority::P0).with_description("2 + 2 is 4"),
        |_| {
            verify_eq!(2 + 2, 4);
            Ok(())
        },
    ));
    task.add_case(TestCase::new(
        meta("storage", "store round trip", Priority::P1),
        StoreRoundTrip::default(),
    ));
    task.add_case(TestCase::from_fn(
        meta("text", "uppercase", Priority::P2),
        |_| {
            let shout = "quiet".to_uppercase();
            verify!(shout == "QUIET", "got {shout}");
            Ok(())
        },
    ));

    let body: Arc<dyn CaseBody> = Arc::new(FnCase::new(|ctx| {
        let a: i64 = ctx.param("a")?.parse().map_err(CaseError::other)?;
        let b: i64 = ctx.param("b")?.parse().map_err(CaseError::other)?;
        let sum: i64 = ctx.param("sum")?.parse().map_err(CaseError::other)?;
        verify_eq!(a + b, sum);
        Ok(())
    }));
    task.add_cases(TestCase::parameterized(
        meta("math", "sum table", Priority::P1),
        body,
        &["a", "b", "sum"],
        [["1", "2", "3"], ["-4", "4", "0"], ["10", "32", "42"]],
    )?);

    Ok(task)
}

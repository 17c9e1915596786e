//! Test case descriptors
//!
//! A [`TestCase`] couples the identity of a case with its lifecycle body and
//! the execution record the recorder writes while the case runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::test_result::{CaseResult, ExecutionRecord};

/// Case priority, P0 being the smoke tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn description(&self) -> &'static str {
        match self {
            Priority::P0 => "Smoke",
            Priority::P1 => "Core",
            Priority::P2 => "Normal",
            Priority::P3 => "Minor",
        }
    }

    pub fn all() -> Vec<Priority> {
        vec![Priority::P0, Priority::P1, Priority::P2, Priority::P3]
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Priority> {
        match s.trim().to_lowercase().as_str() {
            "p0" | "0" | "smoke" => Some(Priority::P0),
            "p1" | "1" | "core" => Some(Priority::P1),
            "p2" | "2" | "normal" => Some(Priority::P2),
            "p3" | "3" | "minor" => Some(Priority::P3),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
        }
    }
}

/// Identity of a test case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMeta {
    pub project: String,
    pub module: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub designer: String,
    pub version: String,
    /// Draft cases are dropped by the default task filter
    pub completed: bool,
}

impl Default for CaseMeta {
    fn default() -> Self {
        Self {
            project: "Default Project".to_string(),
            module: "Default Module".to_string(),
            title: "Default Title".to_string(),
            description: String::new(),
            priority: Priority::P0,
            designer: "Anonymous".to_string(),
            version: "1.0.0".to_string(),
            completed: true,
        }
    }
}

impl CaseMeta {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_designer(mut self, designer: impl Into<String>) -> Self {
        self.designer = designer.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Mark the case as a draft
    pub fn incomplete(mut self) -> Self {
        self.completed = false;
        self
    }
}

/// Fault raised by a lifecycle step
#[derive(Error, Debug)]
pub enum CaseError {
    /// A verification check did not hold
    #[error("assertion failed: {message} (at {location})")]
    Assertion { message: String, location: String },

    /// Anything else that went wrong while running a step
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaseError {
    #[track_caller]
    pub fn assertion(message: impl Into<String>) -> Self {
        let caller = Location::caller();
        CaseError::Assertion {
            message: message.into(),
            location: format!("{}:{}:{}", caller.file(), caller.line(), caller.column()),
        }
    }

    pub fn other(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        CaseError::Other(anyhow::Error::msg(message))
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, CaseError::Assertion { .. })
    }

    /// Full diagnostic text, including the error chain for non-assertion faults
    pub fn diagnostic(&self) -> String {
        match self {
            CaseError::Assertion { .. } => self.to_string(),
            CaseError::Other(e) => format!("{e:?}"),
        }
    }
}

pub type StepResult = Result<(), CaseError>;

/// Fail the current step unless `cond` holds
#[macro_export]
macro_rules! verify {
    ($cond:expr $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err($crate::models::CaseError::assertion(concat!(
                "`",
                stringify!($cond),
                "` does not hold"
            )));
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return ::std::result::Result::Err($crate::models::CaseError::assertion(format!($($arg)+)));
        }
    };
}

/// Fail the current step unless both values are equal
#[macro_export]
macro_rules! verify_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    return ::std::result::Result::Err($crate::models::CaseError::assertion(
                        format!("`left == right` failed\n  left: {:?}\n right: {:?}", left, right),
                    ));
                }
            }
        }
    };
}

/// What a lifecycle step can see about the case it belongs to
#[derive(Clone, Copy, Debug)]
pub struct CaseContext<'a> {
    meta: &'a CaseMeta,
    params: &'a [(String, String)],
}

impl<'a> CaseContext<'a> {
    pub fn meta(&self) -> &'a CaseMeta {
        self.meta
    }

    pub fn title(&self) -> &'a str {
        &self.meta.title
    }

    pub fn params(&self) -> &'a [(String, String)] {
        self.params
    }

    /// Value bound to `name` for a parameterized case
    pub fn param(&self, name: &str) -> Result<&'a str, CaseError> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .ok_or_else(|| CaseError::other(format!("no such parameter: {name}")))
    }
}

/// Setup, action and teardown of a test case
pub trait CaseBody: Send + Sync + 'static {
    fn setup(&self, _ctx: &CaseContext<'_>) -> StepResult {
        Ok(())
    }

    fn action(&self, ctx: &CaseContext<'_>) -> StepResult;

    fn teardown(&self, _ctx: &CaseContext<'_>) -> StepResult {
        Ok(())
    }
}

type StepFn = Box<dyn Fn(&CaseContext<'_>) -> StepResult + Send + Sync>;

/// Case body assembled from closures
pub struct FnCase {
    setup: Option<StepFn>,
    action: StepFn,
    teardown: Option<StepFn>,
}

impl FnCase {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&CaseContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        Self {
            setup: None,
            action: Box::new(action),
            teardown: None,
        }
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&CaseContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn with_teardown<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&CaseContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        self.teardown = Some(Box::new(teardown));
        self
    }
}

impl CaseBody for FnCase {
    fn setup(&self, ctx: &CaseContext<'_>) -> StepResult {
        self.setup.as_ref().map_or(Ok(()), |step| step(ctx))
    }

    fn action(&self, ctx: &CaseContext<'_>) -> StepResult {
        (self.action)(ctx)
    }

    fn teardown(&self, ctx: &CaseContext<'_>) -> StepResult {
        self.teardown.as_ref().map_or(Ok(()), |step| step(ctx))
    }
}

/// A test case descriptor together with its execution record
pub struct TestCase {
    meta: CaseMeta,
    params: Vec<(String, String)>,
    body: Arc<dyn CaseBody>,
    record: Mutex<ExecutionRecord>,
}

impl TestCase {
    pub fn new(meta: CaseMeta, body: impl CaseBody) -> Self {
        Self::with_body(meta, Arc::new(body))
    }

    /// Share one body between several descriptors (parameterized cases)
    pub fn with_body(meta: CaseMeta, body: Arc<dyn CaseBody>) -> Self {
        Self {
            meta,
            params: Vec::new(),
            body,
            record: Mutex::new(ExecutionRecord::default()),
        }
    }

    /// Case whose only step is `action`
    pub fn from_fn<F>(meta: CaseMeta, action: F) -> Self
    where
        F: Fn(&CaseContext<'_>) -> StepResult + Send + Sync + 'static,
    {
        Self::new(meta, FnCase::new(action))
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn meta(&self) -> &CaseMeta {
        &self.meta
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn priority(&self) -> Priority {
        self.meta.priority
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn body(&self) -> &dyn CaseBody {
        self.body.as_ref()
    }

    pub fn context(&self) -> CaseContext<'_> {
        CaseContext {
            meta: &self.meta,
            params: &self.params,
        }
    }

    /// Title with bound parameters, e.g. `login[user=alice]`
    pub fn display_name(&self) -> String {
        if self.params.is_empty() {
            return self.meta.title.clone();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        format!("{}[{}]", self.meta.title, params.join(", "))
    }

    /// Snapshot of the execution record
    pub fn record(&self) -> ExecutionRecord {
        self.lock_record().clone()
    }

    pub fn result(&self) -> CaseResult {
        self.lock_record().result
    }

    pub fn mark_started(&self) {
        self.lock_record().begin(chrono::Local::now());
    }

    pub fn mark_stopped(&self, result: CaseResult, detail: &str) {
        self.lock_record()
            .conclude(result, detail, chrono::Local::now());
    }

    fn lock_record(&self) -> MutexGuard<'_, ExecutionRecord> {
        // The record holds plain data, a poisoned lock still has a usable value
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("meta", &self.meta)
            .field("params", &self.params)
            .field("record", &self.record())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} / {}",
            self.meta.priority,
            self.meta.module,
            self.display_name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(value: u32) -> StepResult {
        verify!(value > 1, "value {} is too small", value);
        verify_eq!(value % 2, 0);
        Ok(())
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!(Priority::from_str("P0"), Some(Priority::P0));
        assert_eq!(Priority::from_str("core"), Some(Priority::P1));
        assert_eq!(Priority::from_str("3"), Some(Priority::P3));
        assert_eq!(Priority::from_str("p9"), None);
    }

    #[test]
    fn test_verify_macros() {
        assert!(checked(4).is_ok());

        let err = checked(1).unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("value 1 is too small"));
        assert!(err.to_string().contains("case.rs"));

        let err = checked(3).unwrap_err();
        assert!(err.is_assertion());
        assert!(err.diagnostic().contains("left: 1"));
    }

    #[test]
    fn test_other_error_diagnostic() {
        let err: CaseError = anyhow::anyhow!("socket closed")
            .context("login request failed")
            .into();
        assert!(!err.is_assertion());
        let diagnostic = err.diagnostic();
        assert!(diagnostic.contains("login request failed"));
        assert!(diagnostic.contains("socket closed"));
    }

    #[test]
    fn test_fn_case_steps() {
        let body = FnCase::new(|ctx| {
            verify_eq!(ctx.param("user")?, "alice");
            Ok(())
        })
        .with_setup(|_| Err(CaseError::other("no database")));

        let case = TestCase::new(CaseMeta::new("login"), body)
            .with_params(vec![("user".to_string(), "alice".to_string())]);
        let ctx = case.context();

        assert!(case.body().setup(&ctx).is_err());
        assert!(case.body().action(&ctx).is_ok());
        assert!(case.body().teardown(&ctx).is_ok());
        assert_eq!(case.display_name(), "login[user=alice]");
        assert!(ctx.param("password").is_err());
    }

    #[test]
    fn test_case_record_transitions() {
        let case = TestCase::from_fn(CaseMeta::new("noop"), |_| Ok(()));
        assert_eq!(case.result(), CaseResult::NotExecuted);

        case.mark_started();
        assert_eq!(case.result(), CaseResult::Executing);

        case.mark_stopped(CaseResult::Pass, "");
        let record = case.record();
        assert_eq!(record.result, CaseResult::Pass);
        assert_eq!(record.attempts, 1);
        assert!(record.stop_time.is_some());
    }

    #[test]
    fn test_meta_builder() {
        let meta = CaseMeta::new("checkout")
            .with_module("cart")
            .with_priority(Priority::P2)
            .incomplete();
        assert_eq!(meta.title, "checkout");
        assert_eq!(meta.module, "cart");
        assert_eq!(meta.priority, Priority::P2);
        assert!(!meta.completed);
        assert_eq!(meta.designer, "Anonymous");
    }
}

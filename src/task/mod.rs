//! Test task
//!
//! An ordered case registry plus the filters that select which registered
//! cases a run executes. Cases are registered explicitly; there is no
//! discovery.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::{CaseBody, CaseMeta, Priority, TestCase};

/// Names a parameter may not take, since they already label a case or
/// its record
const RESERVED_PARAM_NAMES: &[&str] = &[
    "project",
    "module",
    "title",
    "description",
    "priority",
    "designer",
    "version",
    "completed",
    "result",
    "detail",
    "start_time",
    "stop_time",
];

/// Task errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("comparison '{comparison}' is not supported by the {field} filter")]
    UnsupportedComparison {
        field: &'static str,
        comparison: Comparison,
    },

    #[error("comparison '{comparison}' on {field} takes exactly one value, got {got}")]
    ValueCount {
        field: &'static str,
        comparison: Comparison,
        got: usize,
    },

    #[error("parameter row {row} has {got} values, expected {expected}")]
    ParamArity {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("parameter name '{0}' collides with a built-in case field")]
    ParamCollision(String),

    #[error("parameter name '{0}' is given more than once")]
    DuplicateParam(String),
}

/// Filter comparison operator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Contains,
    NotContains,
}

impl Comparison {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "==" | "eq" | "equal" => Some(Comparison::Equal),
            "!=" | "ne" | "not-equal" | "not_equal" => Some(Comparison::NotEqual),
            "in" | "contains" => Some(Comparison::Contains),
            "not-in" | "not_in" | "not-contains" | "not_contains" => Some(Comparison::NotContains),
            _ => None,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Equal => write!(f, "=="),
            Comparison::NotEqual => write!(f, "!="),
            Comparison::Contains => write!(f, "in"),
            Comparison::NotContains => write!(f, "not in"),
        }
    }
}

/// Selection criterion over registered cases
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseFilter {
    /// Compare the completion flag; `Equal` and `NotEqual` only
    Completed(Comparison, bool),
    /// Compare the priority; equality takes a single value
    Priority(Comparison, Vec<Priority>),
}

impl CaseFilter {
    pub fn completed(comparison: Comparison, value: bool) -> Result<Self, TaskError> {
        let filter = CaseFilter::Completed(comparison, value);
        filter.validate()?;
        Ok(filter)
    }

    pub fn priority(comparison: Comparison, values: Vec<Priority>) -> Result<Self, TaskError> {
        let filter = CaseFilter::Priority(comparison, values);
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        match self {
            CaseFilter::Completed(comparison, _) => match comparison {
                Comparison::Equal | Comparison::NotEqual => Ok(()),
                _ => Err(TaskError::UnsupportedComparison {
                    field: "completed",
                    comparison: *comparison,
                }),
            },
            CaseFilter::Priority(comparison, values) => match comparison {
                Comparison::Equal | Comparison::NotEqual if values.len() != 1 => {
                    Err(TaskError::ValueCount {
                        field: "priority",
                        comparison: *comparison,
                        got: values.len(),
                    })
                }
                _ => Ok(()),
            },
        }
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        match self {
            CaseFilter::Completed(Comparison::Equal, value) => case.meta().completed == *value,
            CaseFilter::Completed(Comparison::NotEqual, value) => case.meta().completed != *value,
            CaseFilter::Completed(..) => false,
            CaseFilter::Priority(comparison, values) => {
                let hit = values.contains(&case.priority());
                match comparison {
                    Comparison::Equal | Comparison::Contains => hit,
                    Comparison::NotEqual | Comparison::NotContains => !hit,
                }
            }
        }
    }
}

impl fmt::Display for CaseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseFilter::Completed(comparison, value) => write!(f, "completed {comparison} {value}"),
            CaseFilter::Priority(comparison, values) => {
                let values: Vec<String> = values.iter().map(|p| p.to_string()).collect();
                write!(f, "priority {comparison} [{}]", values.join(", "))
            }
        }
    }
}

/// Ordered set of cases and the filters applied before a run
#[derive(Debug)]
pub struct TestTask {
    name: String,
    cases: Vec<Arc<TestCase>>,
    filters: Vec<CaseFilter>,
}

impl TestTask {
    /// New task that only selects completed cases
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cases: Vec::new(),
            filters: vec![CaseFilter::Completed(Comparison::Equal, true)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_case(&mut self, case: impl Into<Arc<TestCase>>) -> &mut Self {
        self.cases.push(case.into());
        self
    }

    pub fn add_cases<I, C>(&mut self, cases: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Arc<TestCase>>,
    {
        self.cases.extend(cases.into_iter().map(Into::into));
        self
    }

    /// Remove every case titled `title`; returns how many were removed
    pub fn remove_case(&mut self, title: &str) -> usize {
        let before = self.cases.len();
        self.cases.retain(|c| c.title() != title);
        before - self.cases.len()
    }

    pub fn add_filter(&mut self, filter: CaseFilter) -> Result<&mut Self, TaskError> {
        filter.validate()?;
        self.filters.push(filter);
        Ok(self)
    }

    /// Drop every filter, the default one included
    pub fn remove_filters(&mut self) -> &mut Self {
        self.filters.clear();
        self
    }

    pub fn filters(&self) -> &[CaseFilter] {
        &self.filters
    }

    /// Cases matching every filter, in registration order
    pub fn filter_test_cases(&self) -> Vec<Arc<TestCase>> {
        let selected: Vec<Arc<TestCase>> = self
            .cases
            .iter()
            .filter(|c| self.filters.iter().all(|f| f.matches(c)))
            .cloned()
            .collect();

        debug!(
            "Task '{}': {} of {} cases selected",
            self.name,
            selected.len(),
            self.cases.len()
        );
        selected
    }

    pub fn test_cases(&self) -> &[Arc<TestCase>] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Drop every case and every filter, including the default one
    pub fn clear(&mut self) {
        self.cases.clear();
        self.filters.clear();
    }
}

impl TestCase {
    /// Build one case per parameter row, all sharing `body`.
    ///
    /// Every row must supply a value for each name in `names`, and names may
    /// not shadow a built-in case field.
    pub fn parameterized<R, V>(
        meta: CaseMeta,
        body: Arc<dyn CaseBody>,
        names: &[&str],
        rows: impl IntoIterator<Item = R>,
    ) -> Result<Vec<TestCase>, TaskError>
    where
        R: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for (i, name) in names.iter().enumerate() {
            if RESERVED_PARAM_NAMES.contains(name) {
                return Err(TaskError::ParamCollision(name.to_string()));
            }
            if names[..i].contains(name) {
                return Err(TaskError::DuplicateParam(name.to_string()));
            }
        }

        rows.into_iter()
            .enumerate()
            .map(|(row, values)| {
                let values: Vec<String> = values.into_iter().map(Into::into).collect();
                if values.len() != names.len() {
                    return Err(TaskError::ParamArity {
                        row,
                        expected: names.len(),
                        got: values.len(),
                    });
                }
                let params = names.iter().map(|n| n.to_string()).zip(values).collect();
                Ok(TestCase::with_body(meta.clone(), Arc::clone(&body)).with_params(params))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseError, FnCase};

    fn case(title: &str, priority: Priority) -> TestCase {
        TestCase::from_fn(CaseMeta::new(title).with_priority(priority), |_| Ok(()))
    }

    fn titles(cases: &[Arc<TestCase>]) -> Vec<&str> {
        cases.iter().map(|c| c.title()).collect()
    }

    #[test]
    fn test_default_filter_skips_incomplete() {
        let mut task = TestTask::new("smoke");
        task.add_case(case("ready", Priority::P0)).add_case(TestCase::from_fn(
            CaseMeta::new("draft").incomplete(),
            |_| Ok(()),
        ));

        assert_eq!(task.len(), 2);
        assert_eq!(titles(&task.filter_test_cases()), vec!["ready"]);

        task.remove_filters();
        assert_eq!(task.filter_test_cases().len(), 2);
    }

    #[test]
    fn test_priority_filters() {
        let mut task = TestTask::new("mixed");
        task.add_cases(vec![
            case("a", Priority::P0),
            case("b", Priority::P1),
            case("c", Priority::P2),
            case("d", Priority::P3),
        ]);

        let wanted =
            CaseFilter::priority(Comparison::Contains, vec![Priority::P0, Priority::P1]).unwrap();
        task.add_filter(wanted).unwrap();
        assert_eq!(titles(&task.filter_test_cases()), vec!["a", "b"]);

        task.add_filter(CaseFilter::Priority(Comparison::NotEqual, vec![Priority::P0]))
            .unwrap();
        assert_eq!(titles(&task.filter_test_cases()), vec!["b"]);

        task.remove_filters()
            .add_filter(CaseFilter::Priority(Comparison::NotContains, vec![Priority::P3]))
            .unwrap();
        assert_eq!(titles(&task.filter_test_cases()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsupported_filters() {
        assert_eq!(
            CaseFilter::completed(Comparison::Contains, true),
            Err(TaskError::UnsupportedComparison {
                field: "completed",
                comparison: Comparison::Contains
            })
        );
        assert!(matches!(
            CaseFilter::priority(Comparison::Equal, vec![Priority::P0, Priority::P1]),
            Err(TaskError::ValueCount { got: 2, .. })
        ));

        let mut task = TestTask::new("t");
        assert!(task
            .add_filter(CaseFilter::Completed(Comparison::NotContains, false))
            .is_err());
        assert_eq!(task.filters().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut task = TestTask::new("t");
        task.add_cases(vec![
            case("x", Priority::P0),
            case("y", Priority::P0),
            case("x", Priority::P1),
        ]);

        assert_eq!(task.remove_case("x"), 2);
        assert_eq!(titles(task.test_cases()), vec!["y"]);
        assert_eq!(task.remove_case("missing"), 0);

        task.clear();
        assert!(task.is_empty());
        assert!(task.filters().is_empty());

        task.add_case(TestCase::from_fn(CaseMeta::new("draft").incomplete(), |_| Ok(())));
        assert_eq!(titles(&task.filter_test_cases()), vec!["draft"]);
    }

    #[test]
    fn test_parameterized_cases() {
        let body: Arc<dyn CaseBody> = Arc::new(FnCase::new(|ctx| {
            let user = ctx.param("user")?;
            crate::verify!(!user.is_empty(), "empty user");
            Ok(())
        }));

        let cases = TestCase::parameterized(
            CaseMeta::new("login"),
            body,
            &["user", "password"],
            vec![vec!["alice", "secret"], vec!["bob", "hunter2"]],
        )
        .unwrap();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].context().param("user").unwrap(), "bob");
        assert_eq!(cases[0].display_name(), "login[user=alice, password=secret]");

        let ctx = cases[0].context();
        assert!(matches!(ctx.param("token"), Err(CaseError::Other(_))));
    }

    #[test]
    fn test_parameterized_validation() {
        let body: Arc<dyn CaseBody> = Arc::new(FnCase::new(|_| Ok(())));

        let err = TestCase::parameterized(
            CaseMeta::new("p"),
            body.clone(),
            &["a", "b"],
            vec![vec!["1", "2"], vec!["3"]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TaskError::ParamArity {
                row: 1,
                expected: 2,
                got: 1
            }
        );

        let rows = vec![vec!["x"]];
        let err = TestCase::parameterized(CaseMeta::new("p"), body.clone(), &["title"], rows)
            .unwrap_err();
        assert_eq!(err, TaskError::ParamCollision("title".to_string()));

        let rows = vec![vec!["1", "2"]];
        let err =
            TestCase::parameterized(CaseMeta::new("p"), body, &["a", "a"], rows).unwrap_err();
        assert_eq!(err, TaskError::DuplicateParam("a".to_string()));
    }

    #[test]
    fn test_comparison_from_str() {
        assert_eq!(Comparison::from_str("IN"), Some(Comparison::Contains));
        assert_eq!(Comparison::from_str("!="), Some(Comparison::NotEqual));
        assert_eq!(Comparison::from_str("~"), None);
        assert_eq!(
            CaseFilter::Priority(Comparison::Contains, vec![Priority::P0, Priority::P2])
                .to_string(),
            "priority in [P0, P2]"
        );
    }
}

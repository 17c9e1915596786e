//! Built-in suites
//!
//! Example suites exercising every outcome the engine records. Real projects
//! build their own [`TestTask`] the same way.
//!
//! ## Suites
//!
//! - `smoke`: quick cases that all pass
//! - `demo`: one case per outcome (pass, fail, block, timeout) plus retries

mod demo;
mod smoke;

use crate::task::{TaskError, TestTask};

/// A named task factory
#[derive(Clone, Copy)]
pub struct Suite {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Result<TestTask, TaskError>,
}

impl Suite {
    /// Fresh task with newly built cases
    pub fn build(&self) -> Result<TestTask, TaskError> {
        (self.build)()
    }
}

pub fn all() -> Vec<Suite> {
    vec![
        Suite {
            name: "smoke",
            description: "Quick cases that all pass",
            build: smoke::build,
        },
        Suite {
            name: "demo",
            description: "One case per outcome, including a slow and a flaky case",
            build: demo::build,
        },
    ]
}

pub fn find(name: &str) -> Option<Suite> {
    all()
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
}

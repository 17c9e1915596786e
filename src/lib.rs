//! testauto - test execution engine
//!
//! Runs an ordered list of test cases on a bounded worker pool with a
//! per-case timeout, a stop strategy that can end a run early and a retry
//! strategy for cases that do not pass.
//!
//! ```no_run
//! use std::sync::Arc;
//! use testauto::executor::{RunOptions, StopStrategy, TestRunner};
//! use testauto::models::{CaseMeta, TestCase};
//! use testauto::recorder::DefaultRecorder;
//! use testauto::verify_eq;
//!
//! # async fn demo() -> Result<(), testauto::executor::RunError> {
//! let cases = vec![Arc::new(TestCase::from_fn(CaseMeta::new("sum"), |_| {
//!     verify_eq!(1 + 1, 2);
//!     Ok(())
//! }))];
//!
//! let options = RunOptions::default().with_stop(StopStrategy::FirstNotPass);
//! let summary = TestRunner::new(options)?
//!     .run(&cases, Arc::new(DefaultRecorder::new()))
//!     .await?;
//! assert!(summary.is_all_passed());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod models;
pub mod recorder;
pub mod results;
pub mod suites;
pub mod task;
pub mod utils;

//! Data models for test execution
//!
//! This module contains the case descriptors, execution records and
//! summaries shared by the engine, the recorder and the reports.

mod case;
mod test_result;

pub use case::{CaseBody, CaseContext, CaseError, CaseMeta, FnCase, Priority, StepResult, TestCase};
pub use test_result::{CaseResult, ExecutionRecord, TestSummary};

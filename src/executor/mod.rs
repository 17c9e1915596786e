//! Test execution engine
//!
//! Bounded-pool scheduler, per-case timeout supervision and the stop and
//! retry policies.

mod policy;
mod runner;
mod slot;

pub use policy::{Decision, PolicyEngine, RetryStrategy, StopStrategy};
pub use runner::{run_tests, RunError, RunOptions, TestRunner, DEFAULT_TIMEOUT_SECS};
pub use slot::{classify, execute, LifecycleOutcome, SlotOutcome, Step, Verdict, Wait};

//! Assertion helpers for case bodies
//!
//! Both helpers turn an unexpected outcome into [`CaseError::Assertion`], so
//! the case is recorded as a failure rather than a block.

use crate::models::{CaseError, StepResult};

/// Passes only if `f` fails with an error matching `expected`
#[track_caller]
pub fn assert_raises<T, E, F, P>(f: F, expected: P) -> StepResult
where
    F: FnOnce() -> Result<T, E>,
    P: FnOnce(&E) -> bool,
    E: std::fmt::Debug,
{
    match f() {
        Err(e) if expected(&e) => Ok(()),
        Err(e) => Err(CaseError::assertion(format!(
            "raised an unexpected error: {e:?}"
        ))),
        Ok(_) => Err(CaseError::assertion("expected an error, but the call succeeded")),
    }
}

/// Fails if `f` fails with an error matching `forbidden`; other errors pass
#[track_caller]
pub fn assert_not_raises<T, E, F, P>(f: F, forbidden: P) -> StepResult
where
    F: FnOnce() -> Result<T, E>,
    P: FnOnce(&E) -> bool,
    E: std::fmt::Debug,
{
    match f() {
        Err(e) if forbidden(&e) => Err(CaseError::assertion(format!(
            "raised a forbidden error: {e:?}"
        ))),
        _ => Ok(()),
    }
}

//! Results snapshots and reporting
//!
//! Frozen run snapshots, file export and report rendering.

mod report;
mod storage;

pub use report::{ReportFormat, ReportGenerator};
pub use storage::{EnvironmentInfo, ExportFormat, StoredCase, StoredRun};

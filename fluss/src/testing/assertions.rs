//! Assertion helpers for execution reports.

use crate::core::{StageId, StageStatus};
use crate::pipeline::ExecutionReport;

/// Asserts that every scheduled stage succeeded.
pub fn assert_run_succeeded(report: &ExecutionReport) {
    assert!(
        report.success,
        "Expected run to succeed, got error: {:?}",
        report.error
    );
    for record in &report.stages {
        assert_eq!(
            record.status,
            StageStatus::Ok,
            "Stage {} ended as {:?}",
            record.stage,
            record.status
        );
    }
}

/// Asserts that the run stopped early.
pub fn assert_run_failed(report: &ExecutionReport) {
    assert!(!report.success, "Expected run to fail");
    assert!(report.error.is_some(), "Failed run should carry an error");
}

/// Asserts the final status of one stage.
pub fn assert_stage_status(report: &ExecutionReport, stage: StageId, expected: StageStatus) {
    assert_eq!(
        report.status(stage),
        Some(expected),
        "Stage {stage} status mismatch"
    );
}

/// Asserts the statuses of all records, in execution order.
pub fn assert_statuses(report: &ExecutionReport, expected: &[StageStatus]) {
    let actual: Vec<StageStatus> = report.stages.iter().map(|r| r.status).collect();
    assert_eq!(actual, expected, "Stage statuses mismatch");
}

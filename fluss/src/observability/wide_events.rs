//! Wide events summarizing a run in one structured log record.

use crate::core::StageStatus;
use crate::pipeline::{ExecutionReport, StageRecord};
use std::collections::BTreeMap;
use tracing::info;

/// Builds and emits wide event payloads for stages and runs.
#[derive(Debug, Clone)]
pub struct WideEventEmitter {
    /// Event type for stage events.
    pub stage_event_type: String,
    /// Event type for run events.
    pub run_event_type: String,
}

impl Default for WideEventEmitter {
    fn default() -> Self {
        Self {
            stage_event_type: "stage.wide".to_string(),
            run_event_type: "run.wide".to_string(),
        }
    }
}

impl WideEventEmitter {
    /// Creates a new wide event emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stage payload.
    #[must_use]
    pub fn build_stage_payload(report: &ExecutionReport, record: &StageRecord) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "run_id": report.run_id.to_string(),
            "stage": record.stage.to_string(),
            "kind": record.kind.as_str(),
            "status": record.status.to_string(),
            "duration_ms": record.duration_ms,
            "outputs": record.outputs,
        });
        if let Some(err) = &record.error {
            payload["error"] = serde_json::json!(err);
        }
        payload
    }

    /// Builds a run payload with per-status stage counts.
    #[must_use]
    pub fn build_run_payload(report: &ExecutionReport) -> serde_json::Value {
        let cancelled = report.stages.iter().any(|r| r.status == StageStatus::Cancel);
        let status = match (report.success, cancelled) {
            (true, _) => "completed",
            (false, true) => "cancelled",
            (false, false) => "failed",
        };

        let mut stage_counts: BTreeMap<String, u32> = BTreeMap::new();
        for record in &report.stages {
            *stage_counts.entry(record.status.to_string()).or_insert(0) += 1;
        }

        serde_json::json!({
            "run_id": report.run_id.to_string(),
            "started_at": report.started_at.to_rfc3339(),
            "duration_ms": report.duration_ms,
            "status": status,
            "error": report.error,
            "stage_counts": stage_counts,
            "outputs": report.outputs.len(),
        })
    }

    /// Emits one stage event per record, then the run event.
    pub fn emit(&self, report: &ExecutionReport) {
        for record in &report.stages {
            let payload = Self::build_stage_payload(report, record);
            info!(event_type = %self.stage_event_type, payload = %payload, "Wide event");
        }
        let payload = Self::build_run_payload(report);
        info!(event_type = %self.run_event_type, payload = %payload, "Wide event");
    }
}

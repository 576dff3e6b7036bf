//! Runs a pipeline graph against concrete file locations.

use super::PipelineGraph;
use crate::archive::{EntryRef, FileEntry};
use crate::context::ExecutionContext;
use crate::core::{StageId, StageStatus, Target, TargetId, TargetKind};
use crate::errors::{FlussError, GraphError};
use crate::observability::WideEventEmitter;
use crate::operations::{Operation, OperationKind};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Outcome of one stage within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub stage: StageId,
    /// The operation kind.
    pub kind: OperationKind,
    /// Final status.
    pub status: StageStatus,
    /// Locations the stage wrote.
    pub outputs: Vec<PathBuf>,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
    /// Failure message.
    pub error: Option<String>,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Run identifier; temporaries live under `<work_dir>/<run_id>`.
    pub run_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Total wall time in milliseconds.
    pub duration_ms: u64,
    /// True when every scheduled stage succeeded.
    pub success: bool,
    /// Why the run stopped early.
    pub error: Option<String>,
    /// One record per scheduled stage, in execution order.
    pub stages: Vec<StageRecord>,
    /// Output target locations that were written.
    pub outputs: Vec<PathBuf>,
}

impl ExecutionReport {
    /// Returns the record of `stage`.
    #[must_use]
    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.stage == stage)
    }

    /// Returns the status of `stage`.
    #[must_use]
    pub fn status(&self, stage: StageId) -> Option<StageStatus> {
        self.record(stage).map(|record| record.status)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Executes stages one at a time in sorted order.
///
/// Each stage runs on a blocking worker. Temporary targets are written below
/// the run directory and deleted after their last consumer; output targets
/// are written below the output directory.
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    ctx: ExecutionContext,
}

impl PipelineExecutor {
    /// Creates an executor.
    #[must_use]
    pub const fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Returns the run-level context.
    #[must_use]
    pub const fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Returns where `target` is read from or written to.
    ///
    /// Each temporary gets its own directory below the run directory, so
    /// derived targets that keep their source's name never share a file.
    #[must_use]
    pub fn location(&self, target: &Target) -> Option<PathBuf> {
        match target.kind() {
            TargetKind::Input => target
                .source()
                .and_then(|entry| entry.local_path())
                .map(Path::to_path_buf),
            TargetKind::Temporary => {
                let dir = self.ctx.run_dir().join(format!("target-{}", target.id().index()));
                Some(utils::resolve_key(&dir, target.path()))
            }
            TargetKind::Output => Some(utils::resolve_key(self.ctx.output_dir(), target.path())),
        }
    }

    fn input_entry(&self, graph: &PipelineGraph, id: TargetId) -> Result<EntryRef, GraphError> {
        let target = graph.target(id).ok_or(GraphError::UnknownTarget(id))?;
        if let Some(entry) = target.source() {
            return Ok(Arc::clone(entry));
        }
        let path = self.location(target).ok_or(GraphError::UnknownTarget(id))?;
        Ok(Arc::new(FileEntry::new(target.path(), path)))
    }

    fn output_path(&self, graph: &PipelineGraph, id: TargetId) -> Result<PathBuf, GraphError> {
        let target = graph.target(id).ok_or(GraphError::UnknownTarget(id))?;
        if !target.kind().is_derived() {
            return Err(GraphError::InvalidOutput {
                target: id,
                reason: "input targets cannot be produced by a stage".to_string(),
            });
        }
        self.location(target).ok_or(GraphError::UnknownTarget(id))
    }

    /// Sorts `graph` and runs every scheduled stage.
    ///
    /// Returns an error only when the graph cannot be scheduled. Stage
    /// failures and cancellation are reported through the returned report:
    /// a failure marks the remaining stages `Skip`, a cancellation marks
    /// them `Cancel`.
    pub async fn run(&self, graph: &PipelineGraph) -> Result<ExecutionReport, FlussError> {
        let order = graph.sort().inspect_err(|e| {
            if let Some(info) = e.info() {
                warn!(code = %info.code, hint = ?info.fix_hint, "Pipeline cannot be scheduled");
            }
        })?;
        let ctx = self.ctx.clone().with_sources(graph.input_entries());
        let started_at = Utc::now();
        let clock = Instant::now();
        let last_use = graph.last_consumers(&order);

        info!(run_id = %ctx.run_id(), stages = order.len(), "Starting pipeline run");

        let mut records = Vec::with_capacity(order.len());
        let mut outputs = Vec::new();
        let mut error: Option<String> = None;
        let mut halted: Option<StageStatus> = None;

        for (position, &id) in order.iter().enumerate() {
            let stage = graph.stage(id).ok_or_else(|| FlussError::Internal(format!("{id} is not in the graph")))?;
            let kind = stage.kind();

            if halted.is_none() && ctx.cancellation().is_cancelled() {
                let reason = ctx.cancellation().reason().unwrap_or_default();
                warn!(stage = %id, reason = %reason, "Run cancelled before stage");
                error = Some(FlussError::Cancelled(reason).to_string());
                halted = Some(StageStatus::Cancel);
            }
            if let Some(status) = halted {
                records.push(StageRecord {
                    stage: id,
                    kind,
                    status,
                    outputs: Vec::new(),
                    duration_ms: 0,
                    error: None,
                });
                continue;
            }

            let inputs = stage
                .inputs()
                .iter()
                .map(|&target| self.input_entry(graph, target))
                .collect::<Result<Vec<_>, _>>()?;
            let output_paths = stage
                .outputs()
                .iter()
                .map(|&target| self.output_path(graph, target))
                .collect::<Result<Vec<_>, _>>()?;

            let stage_clock = Instant::now();
            let result =
                run_stage(&ctx, id, stage.operation().clone(), inputs, output_paths.clone()).await;
            let duration_ms = millis(stage_clock.elapsed());

            match result {
                Ok(()) => {
                    info!(stage = %id, kind = %kind, duration_ms, "Stage finished");
                    for (&target, path) in stage.outputs().iter().zip(&output_paths) {
                        if graph.target(target).is_some_and(|t| t.kind() == TargetKind::Output) {
                            outputs.push(path.clone());
                        }
                    }
                    if !ctx.keep_temporaries() {
                        self.release_temporaries(graph, &last_use, position);
                    }
                    records.push(StageRecord {
                        stage: id,
                        kind,
                        status: StageStatus::Ok,
                        outputs: output_paths,
                        duration_ms,
                        error: None,
                    });
                }
                Err(message) => {
                    warn!(stage = %id, kind = %kind, error = %message, "Stage failed");
                    for path in &output_paths {
                        if let Err(e) = utils::remove_file_if_exists(path) {
                            warn!(path = %path.display(), error = %e, "Failed to remove partial output");
                        }
                    }
                    error = Some(format!("{id} ({kind}) failed: {message}"));
                    halted = Some(StageStatus::Skip);
                    records.push(StageRecord {
                        stage: id,
                        kind,
                        status: StageStatus::Fail,
                        outputs: Vec::new(),
                        duration_ms,
                        error: Some(message),
                    });
                }
            }
        }

        if !ctx.keep_temporaries() {
            remove_dir_if_exists(&ctx.run_dir());
        }

        let report = ExecutionReport {
            run_id: ctx.run_id(),
            started_at,
            duration_ms: millis(clock.elapsed()),
            success: error.is_none(),
            error,
            stages: records,
            outputs,
        };
        info!(
            run_id = %report.run_id,
            success = report.success,
            executed = report.stages.iter().filter(|r| r.status.ran()).count(),
            duration_ms = report.duration_ms,
            "Pipeline run finished"
        );
        WideEventEmitter::default().emit(&report);
        Ok(report)
    }

    fn release_temporaries(
        &self,
        graph: &PipelineGraph,
        last_use: &BTreeMap<TargetId, usize>,
        position: usize,
    ) {
        for (&target, _) in last_use.iter().filter(|&(_, &last)| last == position) {
            let Some(path) = graph.target(target).and_then(|t| self.location(t)) else {
                continue;
            };
            match utils::remove_file_if_exists(&path) {
                Ok(()) => debug!(target_id = %target, path = %path.display(), "Released temporary"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary"),
            }
        }
    }
}

async fn run_stage(
    ctx: &ExecutionContext,
    id: StageId,
    operation: Operation,
    inputs: Vec<EntryRef>,
    outputs: Vec<PathBuf>,
) -> Result<(), String> {
    let stage_ctx = ctx.for_stage(id);
    let scratch = stage_ctx.scratch_dir().to_path_buf();
    let span = info_span!("stage", stage = %id, kind = %operation.kind());

    let joined = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        info!(inputs = inputs.len(), outputs = outputs.len(), "Stage started");
        operation.execute(&inputs, &outputs, &stage_ctx)
    })
    .await;

    if !ctx.keep_temporaries() {
        remove_dir_if_exists(&scratch);
    }
    match joined {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("stage worker aborted: {e}")),
    }
}

fn remove_dir_if_exists(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlussConfig;

    #[test]
    fn test_locations_by_kind() {
        let config = FlussConfig {
            work_dir: PathBuf::from("/work"),
            output_dir: PathBuf::from("/out"),
            ..FlussConfig::default()
        };
        let ctx = ExecutionContext::new(&config);
        let run_dir = ctx.run_dir();
        let executor = PipelineExecutor::new(ctx);

        let temp = Target::derived(TargetId::new(1), TargetKind::Temporary, "CD1/a.cue");
        let renamed = Target::derived(TargetId::new(3), TargetKind::Temporary, "CD1/a.cue");
        let out = Target::derived(TargetId::new(2), TargetKind::Output, "CD1/a.flac");
        assert_eq!(
            executor.location(&temp),
            Some(run_dir.join("target-1").join("CD1").join("a.cue"))
        );
        assert_ne!(executor.location(&temp), executor.location(&renamed));
        assert_eq!(executor.location(&out), Some(PathBuf::from("/out/CD1/a.flac")));

        let memory = Target::input(
            TargetId::new(0),
            Arc::new(crate::archive::MemoryEntry::file("a.wav", Vec::new())),
        );
        assert_eq!(executor.location(&memory), None);
    }

    #[test]
    fn test_report_lookup() {
        let report = ExecutionReport {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            duration_ms: 3,
            success: true,
            error: None,
            stages: vec![StageRecord {
                stage: StageId::new(4),
                kind: OperationKind::CutCover,
                status: StageStatus::Ok,
                outputs: vec![PathBuf::from("out/cover.jpg")],
                duration_ms: 2,
                error: None,
            }],
            outputs: vec![PathBuf::from("out/cover.jpg")],
        };

        assert_eq!(report.status(StageId::new(4)), Some(StageStatus::Ok));
        assert_eq!(report.status(StageId::new(5)), None);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["stages"][0]["status"], "ok");
        assert_eq!(json["stages"][0]["kind"], "cut_cover");
        assert_eq!(json["run_id"], Uuid::nil().to_string());
    }
}

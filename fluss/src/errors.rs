//! Error types for the fluss pipeline graph.
//!
//! Structural graph errors carry an [`ErrorInfo`] with a stable code and a fix
//! hint so hosts can present them. Operation failures are reported through
//! [`OperationError`] and propagate verbatim out of `execute`.

use crate::core::{StageId, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fluss operations.
#[derive(Debug, Error)]
pub enum FlussError {
    /// The pipeline graph rejected a mutation or could not be scheduled.
    #[error("{0}")]
    Graph(#[from] GraphError),

    /// An operation failed while executing a stage.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic metadata attached to structural graph errors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "GRAPH-002-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Errors raised by [`PipelineGraph`](crate::pipeline::PipelineGraph) mutations and sorting.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// A second stage tried to produce an already produced target.
    #[error("{0}")]
    DuplicateProducer(#[from] DuplicateProducerError),

    /// A stage indirectly consumes its own output.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// Some stages depend on targets nothing produces.
    #[error("{0}")]
    IncompletePipeline(#[from] IncompletePipelineError),

    /// A stage referenced a target that is not part of the graph.
    #[error("Unknown target {0}")]
    UnknownTarget(TargetId),

    /// A stage declared a target it is not allowed to produce.
    #[error("Target {target} cannot be produced: {reason}")]
    InvalidOutput {
        /// The offending target.
        target: TargetId,
        /// Why the target was rejected.
        reason: String,
    },

    /// The caller tried to rename or re-kind a source target.
    #[error("Target {0} is a source entry and cannot be modified")]
    ImmutableTarget(TargetId),
}

impl GraphError {
    /// Returns the diagnostic info for structural errors, if any.
    #[must_use]
    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            Self::DuplicateProducer(e) => Some(&e.error_info),
            Self::CycleDetected(e) => Some(&e.error_info),
            Self::IncompletePipeline(e) => Some(&e.error_info),
            _ => None,
        }
    }
}

/// Error raised when two stages would produce the same target.
#[derive(Debug, Clone, Error)]
#[error("Target {target} already has a producer ({})", existing.map_or_else(|| "same stage".to_string(), |s| s.to_string()))]
pub struct DuplicateProducerError {
    /// The contested target.
    pub target: TargetId,
    /// The stage that already produces it.
    pub existing: Option<StageId>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl DuplicateProducerError {
    /// Creates a new duplicate producer error.
    ///
    /// `existing` is `None` when the rejected stage lists the target twice.
    #[must_use]
    pub fn new(target: TargetId, existing: Option<StageId>) -> Self {
        let mut info = ErrorInfo::new(
            "GRAPH-001-DUPLICATE_PRODUCER",
            format!("Target {target} would have more than one producing stage"),
        )
        .with_fix_hint("Remove the existing producer first, or let the new stage write a fresh target.")
        .with_context_entry("target", target.to_string());
        if let Some(stage) = existing {
            info = info.with_context_entry("existing_stage", stage.to_string());
        }

        Self {
            target,
            existing,
            error_info: info,
        }
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", join_ids(cycle_path, " -> "))]
pub struct CycleDetectedError {
    /// The stages forming the cycle, first stage repeated at the end.
    pub cycle_path: Vec<StageId>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<StageId>) -> Self {
        let info = ErrorInfo::new(
            "GRAPH-002-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", join_ids(&cycle_path, " -> ")),
        )
        .with_fix_hint("Remove one of the stages in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// Error raised by a fail-fast sort when stages cannot be scheduled.
#[derive(Debug, Clone, Error)]
#[error("Pipeline is incomplete: stages {} wait on unproduced targets {}", join_ids(stages, ", "), join_ids(missing, ", "))]
pub struct IncompletePipelineError {
    /// Stages that cannot run.
    pub stages: Vec<StageId>,
    /// Derived targets consumed but never produced.
    pub missing: Vec<TargetId>,
    /// Diagnostic info.
    pub error_info: ErrorInfo,
}

impl IncompletePipelineError {
    /// Creates a new incomplete pipeline error.
    #[must_use]
    pub fn new(stages: Vec<StageId>, missing: Vec<TargetId>) -> Self {
        let info = ErrorInfo::new(
            "GRAPH-003-INCOMPLETE",
            format!("{} stage(s) depend on targets without a producer", stages.len()),
        )
        .with_fix_hint("Add stages producing the missing targets or remove the dependent stages.");

        Self {
            stages,
            missing,
            error_info: info,
        }
    }
}

fn join_ids<T: ToString>(ids: &[T], separator: &str) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Errors raised while executing an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The inputs do not have the shape the operation needs.
    #[error("{operation} cannot run on the given inputs")]
    NotApplicable {
        /// The operation name.
        operation: String,
    },

    /// A required secondary input could not be located.
    #[error("Companion file '{companion}' for '{primary}' not found")]
    MissingCompanion {
        /// The primary input key.
        primary: String,
        /// The expected companion file name.
        companion: String,
    },

    /// An external tool exited unsuccessfully or could not be started.
    #[error("External tool '{program}' failed (exit code {}): {stderr}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ExternalTool {
        /// The program that was invoked.
        program: String,
        /// The exit code, if the process ran.
        exit_code: Option<i32>,
        /// Captured standard error, or the spawn error message.
        stderr: String,
    },

    /// The tool needed for a codec has no configured path.
    #[error("No path configured for tool '{tool}'")]
    ToolNotConfigured {
        /// The tool name.
        tool: String,
    },

    /// A cue sheet references audio that is not among the inputs.
    #[error("Cue sheet '{cuesheet}' references '{reference}' but no matching audio file is present")]
    UnresolvedReference {
        /// The cue sheet key.
        cuesheet: String,
        /// The referenced file name.
        reference: String,
    },

    /// The executor passed a different number of outputs than proposed.
    #[error("Expected {expected} output path(s), got {actual}")]
    OutputCountMismatch {
        /// Expected output count.
        expected: usize,
        /// Actual output count.
        actual: usize,
    },

    /// An input could not be interpreted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image decoding or encoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Reading or writing the tag container failed.
    #[error("Tag error: {0}")]
    Tag(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OperationError {
    /// Creates a not applicable error.
    #[must_use]
    pub fn not_applicable(operation: impl Into<String>) -> Self {
        Self::NotApplicable {
            operation: operation.into(),
        }
    }

    /// Creates an external tool error.
    #[must_use]
    pub fn external_tool(
        program: impl Into<String>,
        exit_code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            program: program.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Checks the number of output paths handed to `execute`.
    pub fn check_outputs(expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::OutputCountMismatch { expected, actual })
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config file {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment variable held an unusable value.
    #[error("Invalid value '{value}' for {key}")]
    InvalidEnv {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_producer_info() {
        let err = DuplicateProducerError::new(TargetId::new(3), Some(StageId::new(1)));

        assert_eq!(err.error_info.code, "GRAPH-001-DUPLICATE_PRODUCER");
        assert_eq!(err.error_info.context.get("existing_stage"), Some(&"stage#1".to_string()));
        assert!(err.to_string().contains("target#3"));
    }

    #[test]
    fn test_cycle_message() {
        let err = CycleDetectedError::new(vec![StageId::new(0), StageId::new(1), StageId::new(0)]);

        assert_eq!(
            err.to_string(),
            "Cycle detected in pipeline: stage#0 -> stage#1 -> stage#0"
        );
        assert!(err.error_info.fix_hint.is_some());
    }

    #[test]
    fn test_graph_error_info() {
        let err: GraphError = IncompletePipelineError::new(vec![StageId::new(2)], vec![TargetId::new(7)]).into();
        assert_eq!(err.info().map(|i| i.code.as_str()), Some("GRAPH-003-INCOMPLETE"));
        assert!(GraphError::UnknownTarget(TargetId::new(1)).info().is_none());
    }

    #[test]
    fn test_external_tool_message() {
        let err = OperationError::external_tool("flac", Some(1), "bad header");
        assert_eq!(
            err.to_string(),
            "External tool 'flac' failed (exit code 1): bad header"
        );

        let err = OperationError::external_tool("tta", None, "not found");
        assert!(err.to_string().contains("exit code none"));
    }

    #[test]
    fn test_check_outputs() {
        assert!(OperationError::check_outputs(1, 1).is_ok());
        assert!(matches!(
            OperationError::check_outputs(2, 1),
            Err(OperationError::OutputCountMismatch { expected: 2, actual: 1 })
        ));
    }
}

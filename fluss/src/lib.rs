//! # Fluss
//!
//! Dependency-tracked transformation pipelines over archived music files.
//!
//! A pipeline graph holds targets (source entries, intermediate files and
//! final outputs) connected by stages. Each stage runs one file operation:
//!
//! - **Text repair**: re-encode logs and cue sheets as UTF-8, fix `FILE` lines
//! - **Audio recoding**: convert between WAV, WavPack, TTA and FLAC via PCM
//! - **Image work**: convert scans, cut square cover art
//! - **Tagging**: embed a cue sheet and cover into an audio file
//!
//! The graph proposes applicable operations for a set of targets, keeps a
//! single producer per target, removes stages with their dependents, and
//! sorts stages so every producer runs before its consumers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fluss::prelude::*;
//!
//! let mut graph = PipelineGraph::new();
//! let inputs = graph.add_inputs(&DirectoryArchive::new("rip"))?;
//! let proposal = graph.propose(&inputs[..1])?.remove(0);
//! let stage = graph.add_proposed_stage(inputs[..1].to_vec(), proposal.operation, &proposal.outputs)?;
//! let outputs = graph.stage(stage).map(|s| s.outputs().to_vec()).unwrap_or_default();
//! for target in outputs {
//!     graph.promote(target)?;
//! }
//!
//! let ctx = ExecutionContext::new(&FlussConfig::from_env()?);
//! let report = PipelineExecutor::new(ctx).run(&graph).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod archive;
pub mod cancellation;
pub mod codecs;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod observability;
pub mod operations;
pub mod pipeline;
pub mod registry;
pub mod tags;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{
        Archive, ArchiveEntry, DirectoryArchive, EntryRef, FileEntry, MemoryArchive, MemoryEntry,
    };
    pub use crate::cancellation::CancellationToken;
    pub use crate::codecs::{AudioCodec, CodecProvider, ExternalCodecs, ImageFormat};
    pub use crate::config::{FlussConfig, Tool, ToolPaths};
    pub use crate::context::ExecutionContext;
    pub use crate::core::{StageId, StageStatus, Target, TargetId, TargetKind};
    pub use crate::errors::{
        CycleDetectedError, DuplicateProducerError, FlussError, GraphError,
        IncompletePipelineError, OperationError,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::operations::{Operation, OperationKind};
    pub use crate::pipeline::{
        ExecutionReport, PipelineExecutor, PipelineGraph, SharedPipelineGraph, SortPolicy, Stage,
    };
    pub use crate::registry::{Applicable, OperationRegistry};
    pub use crate::tags::{LoftyTagEditor, TagEditor};
}

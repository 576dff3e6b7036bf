//! Pipeline graphs and their execution.
//!
//! This module provides:
//! - Stages binding an operation to its input and output targets
//! - The pipeline graph with its mutation, removal and sort queries
//! - A sequential executor that manages temporary targets

mod executor;
mod graph;
mod stage;


pub use executor::{ExecutionReport, PipelineExecutor, StageRecord};
pub use graph::{PipelineGraph, SharedPipelineGraph, SortPolicy};
pub use stage::Stage;

//! Core domain model types for fluss.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Target and stage handles
//! - Target kinds and nodes
//! - Stage execution status

mod status;
mod target;

pub use status::StageStatus;
pub use target::{StageId, Target, TargetId, TargetKind};

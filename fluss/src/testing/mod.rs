//! Testing utilities for fluss pipelines.
//!
//! This module provides:
//! - Fake codec and tag collaborators that record their calls
//! - Fixture builders for entries and images
//! - Assertions over execution reports

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_run_failed, assert_run_succeeded, assert_stage_status, assert_statuses,
};
pub use mocks::{CodecCall, FakeCodecs, RecordingTagEditor, SavedTags};

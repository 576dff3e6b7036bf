//! Final status of a scheduled stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage ended within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The operation wrote all outputs.
    Ok,
    /// The operation returned an error.
    Fail,
    /// Not run because an earlier stage failed.
    Skip,
    /// Not run because the run was cancelled.
    Cancel,
}

impl StageStatus {
    /// Returns true if the operation was invoked.
    #[must_use]
    pub const fn ran(self) -> bool {
        matches!(self, Self::Ok | Self::Fail)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Cancel => "cancel",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde() {
        for status in [StageStatus::Ok, StageStatus::Fail, StageStatus::Skip, StageStatus::Cancel] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn test_ran() {
        assert!(StageStatus::Fail.ran());
        assert!(!StageStatus::Skip.ran());
        assert!(!StageStatus::Cancel.ran());
    }
}

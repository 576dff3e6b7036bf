//! Targets: the nodes of a pipeline graph.

use crate::archive::EntryRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a target inside one [`PipelineGraph`](crate::pipeline::PipelineGraph).
///
/// Handles are allocated monotonically and never reused, so two handles are
/// equal iff they name the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(usize);

impl TargetId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Opaque handle of a stage inside one pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId(usize);

impl StageId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage#{}", self.0)
    }
}

/// The role a target plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A source entry of the archive. Always available, never produced.
    Input,
    /// A final artifact written to the output directory.
    Output,
    /// An intermediate artifact deleted once no longer needed.
    Temporary,
}

impl TargetKind {
    /// Returns true for kinds that must be produced by a stage.
    #[must_use]
    pub const fn is_derived(self) -> bool {
        !matches!(self, Self::Input)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Temporary => write!(f, "temporary"),
        }
    }
}

/// A node of the pipeline graph.
#[derive(Debug, Clone)]
pub struct Target {
    id: TargetId,
    kind: TargetKind,
    path: String,
    source: Option<EntryRef>,
}

impl Target {
    /// Creates a source target backed by an archive entry.
    ///
    /// The path is the entry key and cannot change afterwards.
    #[must_use]
    pub fn input(id: TargetId, entry: EntryRef) -> Self {
        Self {
            id,
            kind: TargetKind::Input,
            path: entry.key().to_string(),
            source: Some(entry),
        }
    }

    /// Creates a derived target with a caller-assigned path.
    ///
    /// `kind` is coerced to [`TargetKind::Temporary`] if `Input` is given,
    /// since inputs need a source entry.
    #[must_use]
    pub fn derived(id: TargetId, kind: TargetKind, path: impl Into<String>) -> Self {
        let kind = if kind == TargetKind::Input {
            TargetKind::Temporary
        } else {
            kind
        };
        Self {
            id,
            kind,
            path: path.into(),
            source: None,
        }
    }

    /// Returns the handle of this target.
    #[must_use]
    pub const fn id(&self) -> TargetId {
        self.id
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Returns the relative path used to materialize the target.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the backing entry of an input target.
    #[must_use]
    pub const fn source(&self) -> Option<&EntryRef> {
        self.source.as_ref()
    }

    /// Returns true if this is a source entry.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self.kind, TargetKind::Input)
    }

    pub(crate) fn set_kind(&mut self, kind: TargetKind) {
        self.kind = kind;
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryEntry;
    use std::sync::Arc;

    #[test]
    fn test_input_target_uses_entry_key() {
        let entry: EntryRef = Arc::new(MemoryEntry::file("CD1/01.flac", b"fLaC".to_vec()));
        let target = Target::input(TargetId::new(0), entry);

        assert_eq!(target.path(), "CD1/01.flac");
        assert!(target.is_input());
        assert!(target.source().is_some());
    }

    #[test]
    fn test_derived_never_input() {
        let target = Target::derived(TargetId::new(4), TargetKind::Input, "a.wav");
        assert_eq!(target.kind(), TargetKind::Temporary);
        assert!(target.source().is_none());
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(TargetId::new(2).to_string(), "target#2");
        assert_eq!(StageId::new(5).to_string(), "stage#5");
        assert!(TargetId::new(1) < TargetId::new(2));
    }
}

use super::ArchiveEntry;
use std::io::{self, Read};

/// Stand-in for a derived target that has not been materialized yet.
///
/// It carries only a key, which is all most feasibility checks look at.
/// Opening it fails with [`io::ErrorKind::NotFound`].
#[derive(Debug, Clone)]
pub struct PlannedEntry {
    key: String,
}

impl PlannedEntry {
    /// Creates a planned entry for `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ArchiveEntry for PlannedEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn size(&self) -> u64 {
        0
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} has not been produced yet", self.key),
        ))
    }
}

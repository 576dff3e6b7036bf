//! In-memory archive.

use super::{Archive, ArchiveEntry, EntryRef};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// An entry whose content lives in memory.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    key: String,
    data: Arc<[u8]>,
    is_directory: bool,
}

impl MemoryEntry {
    /// Creates a file entry.
    #[must_use]
    pub fn file(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: Arc::from(data.into()),
            is_directory: false,
        }
    }

    /// Creates a directory entry.
    #[must_use]
    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: Arc::from(Vec::new()),
            is_directory: true,
        }
    }
}

impl ArchiveEntry for MemoryEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }
}

/// A list of in-memory entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<MemoryEntry>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file entry.
    #[must_use]
    pub fn with_file(mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.entries.push(MemoryEntry::file(key, data));
        self
    }

    /// Adds a directory entry.
    #[must_use]
    pub fn with_directory(mut self, key: impl Into<String>) -> Self {
        self.entries.push(MemoryEntry::directory(key));
        self
    }
}

impl Archive for MemoryArchive {
    fn entries(&self) -> io::Result<Vec<EntryRef>> {
        let mut entries: Vec<EntryRef> = self
            .entries
            .iter()
            .map(|e| Arc::new(e.clone()) as EntryRef)
            .collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(entries)
    }
}

//! Archive collaborators.
//!
//! The pipeline only needs a path and a byte stream from each source entry.
//! [`DirectoryArchive`] walks a folder on disk and [`MemoryArchive`] holds
//! entries in memory; hosts can plug in RAR/ZIP readers through [`Archive`].

mod directory;
mod memory;
mod planned;

pub use directory::{DirectoryArchive, FileEntry};
pub use memory::{MemoryArchive, MemoryEntry};
pub use planned::PlannedEntry;

use std::fmt::Debug;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

/// A single entry of an archive or directory.
///
/// Keys are relative paths using `/` as separator.
pub trait ArchiveEntry: Send + Sync + Debug {
    /// Returns the entry key.
    fn key(&self) -> &str;

    /// Returns the uncompressed size in bytes.
    fn size(&self) -> u64;

    /// Opens a fresh stream over the entry content.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Returns true for directory entries.
    fn is_directory(&self) -> bool {
        false
    }

    /// Returns the location on disk when the entry is a plain file.
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Reads the whole entry into memory.
    fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut reader = self.open()?;
        let mut buf = Vec::with_capacity(usize::try_from(self.size()).unwrap_or(0));
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Returns the last path component of the key.
    fn file_name(&self) -> &str {
        crate::utils::file_name(self.key())
    }
}

/// Shared handle to an archive entry.
pub type EntryRef = Arc<dyn ArchiveEntry>;

/// A source of entries, enumerated in stable key order.
pub trait Archive: Send + Sync {
    /// Lists all entries sorted by key.
    fn entries(&self) -> io::Result<Vec<EntryRef>>;
}

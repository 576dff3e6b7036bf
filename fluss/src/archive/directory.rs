//! Directory-backed archive.

use super::{Archive, ArchiveEntry, EntryRef};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// A plain file on disk exposed as an archive entry.
#[derive(Debug, Clone)]
pub struct FileEntry {
    key: String,
    path: PathBuf,
    size: u64,
    is_directory: bool,
}

impl FileEntry {
    /// Creates an entry for `path` under the given key.
    ///
    /// The size is read from the file system; a missing file reports zero.
    #[must_use]
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let metadata = std::fs::metadata(&path).ok();
        Self {
            key: key.into(),
            size: metadata.as_ref().map_or(0, std::fs::Metadata::len),
            is_directory: metadata.as_ref().is_some_and(std::fs::Metadata::is_dir),
            path,
        }
    }

    /// Returns the file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveEntry for FileEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// A folder treated as an archive. Keys are relative to the root.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    /// Creates an archive over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root folder.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Archive for DirectoryArchive {
    fn entries(&self) -> io::Result<Vec<EntryRef>> {
        let mut entries: Vec<EntryRef> = Vec::new();
        for item in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let item = item.map_err(io::Error::from)?;
            let relative = item
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(Arc::new(FileEntry::new(key, item.path())));
        }
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_entries_sorted_with_relative_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("Scans")).unwrap();
        std::fs::write(dir.path().join("b.cue"), b"FILE").unwrap();
        std::fs::write(dir.path().join("a.flac"), b"fLaC").unwrap();
        std::fs::write(dir.path().join("Scans").join("front.jpg"), b"jpg").unwrap();

        let archive = DirectoryArchive::new(dir.path());
        let entries = archive.entries().unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key()).collect();

        assert_eq!(keys, vec!["Scans", "Scans/front.jpg", "a.flac", "b.cue"]);
        assert!(entries[0].is_directory());
        assert_eq!(entries[2].size(), 4);
        assert_eq!(entries[3].read_all().unwrap(), b"FILE");
    }

    #[test]
    fn test_file_entry_local_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, b"rip log").unwrap();

        let entry = FileEntry::new("log.txt", &path);
        assert_eq!(entry.local_path(), Some(path.as_path()));
        assert_eq!(entry.file_name(), "log.txt");
    }
}

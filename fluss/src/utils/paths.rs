//! Helpers for `/`-separated entry keys and output locations.

use std::io;
use std::path::{Path, PathBuf};

/// Returns the last component of a key.
#[must_use]
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Returns the directory part of a key, or `""` for top-level keys.
#[must_use]
pub fn parent_key(key: &str) -> &str {
    key.rfind('/').map_or("", |idx| &key[..idx])
}

/// Returns the file name without its final extension.
#[must_use]
pub fn file_stem(key: &str) -> &str {
    let name = file_name(key);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Returns the lowercase extension without the dot.
#[must_use]
pub fn extension(key: &str) -> Option<String> {
    let name = file_name(key);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
    }
}

/// Builds a key for `name` in the same directory as `key`.
#[must_use]
pub fn sibling_key(key: &str, name: &str) -> String {
    let parent = parent_key(key);
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Resolves a relative key below `root`.
#[must_use]
pub fn resolve_key(root: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Creates the parent directories of each path.
pub fn ensure_parent_dirs<P: AsRef<Path>>(paths: &[P]) -> io::Result<()> {
    for path in paths {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

/// Removes a file, treating a missing file as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

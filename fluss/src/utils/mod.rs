//! Utility functions for entry keys and file locations.

mod paths;

pub use paths::{
    ensure_parent_dirs, extension, file_name, file_stem, parent_key, remove_file_if_exists,
    resolve_key, sibling_key,
};

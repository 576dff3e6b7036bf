use super::{FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::PathBuf;

/// Copies one entry unchanged to `<stem>.<suffix>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassThrough {
    /// Inserted between stem and extension of the output name.
    pub suffix: String,
}

impl Default for PassThrough {
    fn default() -> Self {
        Self {
            suffix: "copy".to_string(),
        }
    }
}

impl FileOperation for PassThrough {
    const KIND: OperationKind = OperationKind::PassThrough;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let [input] = inputs else {
            return None;
        };
        if input.is_directory() {
            return None;
        }

        let key = input.key();
        let stem = utils::file_stem(key);
        let name = match utils::extension(key) {
            Some(ext) => format!("{stem}.{}.{ext}", self.suffix),
            None => format!("{stem}.{}", self.suffix),
        };
        Some(vec![utils::sibling_key(key, &name)])
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        _ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let [input] = inputs else {
            return Err(OperationError::not_applicable(Self::KIND.as_str()));
        };
        OperationError::check_outputs(1, outputs.len())?;

        utils::ensure_parent_dirs(outputs)?;
        let mut reader = input.open()?;
        let mut writer = File::create(&outputs[0])?;
        io::copy(&mut reader, &mut writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryEntry;
    use crate::config::FlussConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(key: &str, data: &[u8]) -> EntryRef {
        Arc::new(MemoryEntry::file(key, data.to_vec()))
    }

    #[test]
    fn test_pass_names_copy_next_to_input() {
        let mut op = PassThrough::default();
        assert_eq!(
            op.pass(&[entry("CD1/album.log", b"")]),
            Some(vec!["CD1/album.copy.log".to_string()])
        );
        assert_eq!(op.pass(&[entry("README", b"")]), Some(vec!["README.copy".to_string()]));
    }

    #[test]
    fn test_pass_requires_single_file() {
        let mut op = PassThrough::default();
        assert_eq!(op.pass(&[]), None);
        assert_eq!(op.pass(&[entry("a.log", b""), entry("b.log", b"")]), None);
        let dir: EntryRef = Arc::new(MemoryEntry::directory("CD1"));
        assert_eq!(op.pass(&[dir]), None);
    }

    #[test]
    fn test_execute_copies_bytes() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/album.copy.bin");
        let data: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        let ctx = ExecutionContext::new(&FlussConfig::default());

        PassThrough::default()
            .execute(&[entry("album.bin", &data)], &[out.clone()], &ctx)
            .unwrap();

        assert_eq!(std::fs::read(out).unwrap(), data);
    }

    #[test]
    fn test_execute_checks_output_count() {
        let ctx = ExecutionContext::new(&FlussConfig::default());
        let err = PassThrough::default()
            .execute(&[entry("a.bin", b"x")], &[], &ctx)
            .unwrap_err();
        assert!(matches!(err, OperationError::OutputCountMismatch { expected: 1, actual: 0 }));
    }
}

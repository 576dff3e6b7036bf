//! Tag container collaborators used to embed metadata into audio files.

use crate::errors::OperationError;
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagExt};
use std::fmt::Debug;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens tag containers for audio files.
#[cfg_attr(test, mockall::automock)]
pub trait TagEditor: Send + Sync + Debug {
    /// Opens the tag container of `path`, creating one if the file has none.
    fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>, OperationError>;
}

/// An open, editable tag container.
pub trait TagContainer {
    /// Sets a named text field.
    fn set_text(&mut self, name: &str, value: &str);

    /// Replaces the front cover picture.
    fn set_front_cover(&mut self, data: &[u8], mime_type: &str) -> Result<(), OperationError>;

    /// Writes the container back to its file.
    fn save(self: Box<Self>) -> Result<(), OperationError>;
}

/// Tag editor backed by `lofty`, writing each file's primary tag type.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagEditor;

impl TagEditor for LoftyTagEditor {
    fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>, OperationError> {
        let tagged_file = Probe::open(path)
            .map_err(|e| OperationError::Tag(e.to_string()))?
            .read()
            .map_err(|e| OperationError::Tag(e.to_string()))?;

        let tag_type = tagged_file.primary_tag_type();
        let tag = tagged_file
            .tag(tag_type)
            .cloned()
            .unwrap_or_else(|| Tag::new(tag_type));
        debug!(path = %path.display(), ?tag_type, "Opened tag container");

        Ok(Box::new(LoftyContainer {
            path: path.to_path_buf(),
            tag,
        }))
    }
}

struct LoftyContainer {
    path: PathBuf,
    tag: Tag,
}

impl TagContainer for LoftyContainer {
    fn set_text(&mut self, name: &str, value: &str) {
        self.tag
            .insert_text(ItemKey::Unknown(name.to_string()), value.to_string());
    }

    fn set_front_cover(&mut self, data: &[u8], mime_type: &str) -> Result<(), OperationError> {
        let mut picture = Picture::from_reader(&mut Cursor::new(data))
            .map_err(|e| OperationError::Tag(e.to_string()))?;
        picture.set_pic_type(PictureType::CoverFront);
        debug!(mime_type, detected = ?picture.mime_type(), "Embedding front cover");

        self.tag.remove_picture_type(PictureType::CoverFront);
        self.tag.push_picture(picture);
        Ok(())
    }

    fn save(self: Box<Self>) -> Result<(), OperationError> {
        self.tag
            .save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| OperationError::Tag(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lofty_rejects_non_audio() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.wv");
        std::fs::write(&path, b"definitely not wavpack").unwrap();

        let Err(err) = LoftyTagEditor.open(&path) else {
            panic!("opened tags of a non-audio file");
        };
        assert!(matches!(err, OperationError::Tag(_)));
    }

    #[test]
    fn test_mock_editor_is_object_safe() {
        let mut editor = MockTagEditor::new();
        editor
            .expect_open()
            .returning(|_| Err(OperationError::Tag("locked".to_string())));

        let editor: Box<dyn TagEditor> = Box::new(editor);
        assert!(editor.open(Path::new("a.wv")).is_err());
    }
}

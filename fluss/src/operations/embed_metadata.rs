use super::{decode_text, entry_extension, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::codecs::{is_cue_audio, ImageFormat};
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Embeds a cue sheet and a cover picture into an audio file's tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedMetadata {
    /// Text field that receives the cue sheet.
    pub cuesheet_field: String,
}

impl Default for EmbedMetadata {
    fn default() -> Self {
        Self {
            cuesheet_field: "CUESHEET".to_string(),
        }
    }
}

struct Parts<'a> {
    audio: &'a EntryRef,
    cue: Option<&'a EntryRef>,
    image: Option<(&'a EntryRef, ImageFormat)>,
}

fn classify(inputs: &[EntryRef]) -> Option<Parts<'_>> {
    if inputs.len() < 2 {
        return None;
    }
    let mut audio = None;
    let mut cue = None;
    let mut image = None;

    for entry in inputs {
        let ext = entry_extension(entry)?;
        let slot_taken = if ext == "cue" {
            cue.replace(entry).is_some()
        } else if let Some(format) = ImageFormat::from_extension(&ext) {
            image.replace((entry, format)).is_some()
        } else if is_cue_audio(&ext) {
            audio.replace(entry).is_some()
        } else {
            return None;
        };
        if slot_taken {
            return None;
        }
    }

    Some(Parts {
        audio: audio?,
        cue,
        image,
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

impl FileOperation for EmbedMetadata {
    const KIND: OperationKind = OperationKind::EmbedMetadata;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        classify(inputs).map(|parts| vec![parts.audio.key().to_string()])
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let parts =
            classify(inputs).ok_or_else(|| OperationError::not_applicable(Self::KIND.as_str()))?;
        OperationError::check_outputs(1, outputs.len())?;
        let output = &outputs[0];

        let in_place = parts
            .audio
            .local_path()
            .is_some_and(|path| same_file(path, output));
        if !in_place {
            utils::ensure_parent_dirs(outputs)?;
            let mut reader = parts.audio.open()?;
            let mut writer = File::create(output)?;
            io::copy(&mut reader, &mut writer)?;
        }

        let mut tags = ctx.tags().open(output)?;
        if let Some(cue) = parts.cue {
            let (text, _) = decode_text(&cue.read_all()?, None);
            tags.set_text(&self.cuesheet_field, &text);
        }
        if let Some((image, format)) = parts.image {
            tags.set_front_cover(&image.read_all()?, format.mime_type())?;
        }
        debug!(
            audio = parts.audio.key(),
            cue = parts.cue.is_some(),
            cover = parts.image.is_some(),
            "Saving embedded metadata"
        );
        tags.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{FileEntry, MemoryEntry};
    use crate::config::FlussConfig;
    use crate::tags::MockTagEditor;
    use crate::testing::RecordingTagEditor;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(key: &str, data: &[u8]) -> EntryRef {
        Arc::new(MemoryEntry::file(key, data.to_vec()))
    }

    #[test]
    fn test_pass_shapes() {
        let mut op = EmbedMetadata::default();
        let full = [entry("a.flac", b""), entry("a.cue", b""), entry("cover.jpg", b"")];
        assert_eq!(op.pass(&full), Some(vec!["a.flac".to_string()]));
        assert_eq!(
            op.pass(&[entry("a.cue", b""), entry("CD1/a.wv", b"")]),
            Some(vec!["CD1/a.wv".to_string()])
        );

        assert_eq!(op.pass(&[entry("a.flac", b"")]), None);
        assert_eq!(op.pass(&[entry("a.flac", b""), entry("b.flac", b"")]), None);
        assert_eq!(op.pass(&[entry("a.cue", b""), entry("front.png", b"")]), None);
        assert_eq!(op.pass(&[entry("a.flac", b""), entry("a.log", b"")]), None);
        assert_eq!(
            op.pass(&[entry("a.flac", b""), entry("a.png", b""), entry("b.jpg", b"")]),
            None
        );
    }

    #[test]
    fn test_execute_copies_and_tags() {
        let dir = TempDir::new().unwrap();
        let editor = RecordingTagEditor::new();
        let ctx = ExecutionContext::new(&FlussConfig::default())
            .with_tag_editor(Arc::new(editor.clone()));
        let out = dir.path().join("CD1/a.flac");
        let cue = "\u{feff}FILE \"a.flac\" WAVE\r\n";

        EmbedMetadata::default()
            .execute(
                &[
                    entry("a.flac", b"fLaC-audio"),
                    entry("a.cue", cue.as_bytes()),
                    entry("front.jpg", b"\xFF\xD8jpeg"),
                ],
                &[out.clone()],
                &ctx,
            )
            .unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"fLaC-audio");
        let saved = editor.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].path, out);
        assert_eq!(
            saved[0].text,
            vec![("CUESHEET".to_string(), "FILE \"a.flac\" WAVE\r\n".to_string())]
        );
        assert_eq!(
            saved[0].cover,
            Some((b"\xFF\xD8jpeg".to_vec(), "image/jpeg".to_string()))
        );
    }

    #[test]
    fn test_co_located_audio_is_not_copied() {
        let dir = TempDir::new().unwrap();
        let audio_path = dir.path().join("a.wv");
        std::fs::write(&audio_path, b"wvpk").unwrap();
        let audio: EntryRef = Arc::new(FileEntry::new("a.wv", &audio_path));
        let editor = RecordingTagEditor::new();
        let ctx = ExecutionContext::new(&FlussConfig::default())
            .with_tag_editor(Arc::new(editor.clone()));

        EmbedMetadata::default()
            .execute(&[audio, entry("cover.png", b"png")], &[audio_path.clone()], &ctx)
            .unwrap();

        assert_eq!(std::fs::read(&audio_path).unwrap(), b"wvpk");
        assert_eq!(editor.saved()[0].cover.as_ref().map(|(_, mime)| mime.as_str()), Some("image/png"));
    }

    #[test]
    fn test_tag_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let mut editor = MockTagEditor::new();
        editor
            .expect_open()
            .times(1)
            .returning(|_| Err(OperationError::Tag("unsupported container".to_string())));
        let ctx = ExecutionContext::new(&FlussConfig::default()).with_tag_editor(Arc::new(editor));

        let err = EmbedMetadata::default()
            .execute(
                &[entry("a.tta", b"TTA1"), entry("a.cue", b"REM")],
                &[dir.path().join("a.tta")],
                &ctx,
            )
            .unwrap_err();
        assert!(matches!(err, OperationError::Tag(ref msg) if msg == "unsupported container"));
    }
}

use super::fix_encoding::{decode_text, UTF8_BOM};
use super::{entry_extension, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::codecs::{is_cue_audio, CUE_AUDIO_EXTENSIONS};
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::debug;

#[allow(clippy::expect_used)]
static FILE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?P<indent>\s*)(?i:FILE)\s+(?:"(?P<quoted>[^"]*)"|(?P<bare>\S+))"#)
        .expect("FILE directive pattern is valid")
});

/// Rewrites the `FILE` directives of a cue sheet to name audio files that
/// are actually present.
///
/// Each reference is resolved against the audio inputs by trying the
/// reference's stem, then the cue sheet's own stem, with every audio
/// extension. The result is UTF-8 with a BOM; line endings are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixCuesheet {
    /// File type keyword written after the file name.
    pub file_type: String,
}

impl Default for FixCuesheet {
    fn default() -> Self {
        Self {
            file_type: "WAVE".to_string(),
        }
    }
}

fn is_cue(entry: &EntryRef) -> bool {
    entry_extension(entry).as_deref() == Some("cue")
}

fn is_audio(entry: &EntryRef) -> bool {
    entry_extension(entry).is_some_and(|ext| is_cue_audio(&ext))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn resolve_reference<'a>(reference: &str, cue_key: &str, audio: &[&'a EntryRef]) -> Option<&'a str> {
    let reference = reference.replace('\\', "/");
    let stems = [utils::file_stem(&reference), utils::file_stem(cue_key)];

    stems.iter().find_map(|stem| {
        CUE_AUDIO_EXTENSIONS.iter().find_map(|ext| {
            audio
                .iter()
                .find(|entry| {
                    utils::file_stem(entry.key()).eq_ignore_ascii_case(stem)
                        && entry_extension(entry).as_deref() == Some(*ext)
                })
                .copied()
                .map(|entry| entry.file_name())
        })
    })
}

impl FileOperation for FixCuesheet {
    const KIND: OperationKind = OperationKind::FixCuesheet;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let mut cues = inputs.iter().filter(|entry| is_cue(entry));
        let cue = cues.next()?;
        if cues.next().is_some() || !inputs.iter().all(|e| is_cue(e) || is_audio(e)) {
            return None;
        }
        Some(vec![cue.key().to_string()])
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        _ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let cue = match inputs.iter().filter(|entry| is_cue(entry)).collect::<Vec<_>>()[..] {
            [cue] => cue,
            _ => return Err(OperationError::not_applicable(Self::KIND.as_str())),
        };
        let audio: Vec<&EntryRef> = inputs.iter().filter(|entry| is_audio(entry)).collect();
        OperationError::check_outputs(1, outputs.len())?;

        let (text, _) = decode_text(&cue.read_all()?, None);
        let mut fixed = String::with_capacity(text.len() + UTF8_BOM.len());
        fixed.push_str(UTF8_BOM);

        for line in text.split_inclusive('\n') {
            let (content, ending) = split_line_ending(line);
            let Some(caps) = FILE_DIRECTIVE.captures(content) else {
                fixed.push_str(line);
                continue;
            };

            let reference = caps
                .name("quoted")
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            let name = resolve_reference(reference, cue.key(), &audio).ok_or_else(|| {
                OperationError::UnresolvedReference {
                    cuesheet: cue.key().to_string(),
                    reference: reference.to_string(),
                }
            })?;
            debug!(cuesheet = cue.key(), reference, resolved = name, "Rewriting FILE directive");

            let indent = caps.name("indent").map_or("", |m| m.as_str());
            fixed.push_str(&format!("{indent}FILE \"{name}\" {}{ending}", self.file_type));
        }

        utils::ensure_parent_dirs(outputs)?;
        std::fs::write(&outputs[0], fixed)?;
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

    fn entry(key: &str, data: &str) -> EntryRef {
        Arc::new(MemoryEntry::file(key, data.as_bytes().to_vec()))
    }

    fn run(inputs: &[EntryRef]) -> Result<String, OperationError> {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("album.cue");
        let ctx = ExecutionContext::new(&FlussConfig::default());
        FixCuesheet::default().execute(inputs, &[out.clone()], &ctx)?;
        Ok(std::fs::read_to_string(out).unwrap())
    }

    #[test]
    fn test_pass_proposes_cue_name() {
        let mut op = FixCuesheet::default();
        let inputs = [entry("album.cue", ""), entry("album.flac", "")];
        assert_eq!(op.pass(&inputs), Some(vec!["album.cue".to_string()]));
    }

    #[test]
    fn test_pass_rejects_other_shapes() {
        let mut op = FixCuesheet::default();
        assert_eq!(op.pass(&[entry("album.flac", "")]), None);
        assert_eq!(op.pass(&[entry("a.cue", ""), entry("b.cue", "")]), None);
        assert_eq!(op.pass(&[entry("a.cue", ""), entry("a.log", "")]), None);
    }

    #[test]
    fn test_execute_points_file_at_present_audio() {
        let cue = "REM GENRE Rock\r\nFILE \"Album (Disc 1).wav\" WAVE\r\n  TRACK 01 AUDIO\r\n";
        let fixed = run(&[entry("album.cue", cue), entry("album.flac", "")]).unwrap();

        assert_eq!(
            fixed,
            format!(
                "{UTF8_BOM}REM GENRE Rock\r\nFILE \"album.flac\" WAVE\r\n  TRACK 01 AUDIO\r\n"
            )
        );
    }

    #[test]
    fn test_reference_stem_wins_over_cue_stem() {
        let cue = "FILE \"disc2.wav\" WAVE\n  TRACK 01 AUDIO\nFILE disc1.ape WAVE\n";
        let fixed = run(&[
            entry("album.cue", cue),
            entry("album.flac", ""),
            entry("Disc1.tta", ""),
            entry("disc2.wv", ""),
        ])
        .unwrap();

        assert_eq!(
            fixed,
            format!("{UTF8_BOM}FILE \"disc2.wv\" WAVE\n  TRACK 01 AUDIO\nFILE \"Disc1.tta\" WAVE\n")
        );
    }

    #[test]
    fn test_unresolved_reference() {
        let cue = "FILE \"other.wav\" WAVE\n";
        let err = run(&[entry("album.cue", cue), entry("bonus.flac", "")]).unwrap_err();
        match err {
            OperationError::UnresolvedReference { cuesheet, reference } => {
                assert_eq!(cuesheet, "album.cue");
                assert_eq!(reference, "other.wav");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_windows_paths_in_reference() {
        let cue = "FILE \"C:\\Rips\\Live.wav\" WAVE\n";
        let fixed = run(&[entry("set.cue", cue), entry("live.flac", "")]).unwrap();
        assert_eq!(fixed, format!("{UTF8_BOM}FILE \"live.flac\" WAVE\n"));
    }
}

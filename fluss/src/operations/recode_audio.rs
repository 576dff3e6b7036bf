use super::{entry_extension, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::codecs::{AudioCodec, EncodeOptions};
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Converts an audio file to another codec through a PCM stream.
///
/// WavPack sources may be followed by their `.wvc` correction file; when it
/// is not among the inputs it is looked up among the run's sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecodeAudio {
    /// Output codec.
    pub target: AudioCodec,
    /// WavPack hybrid bitrate in kbps. Produces a `.wvc` output as well.
    pub hybrid_bitrate: Option<u32>,
    /// Fail when a WavPack source has no correction file.
    pub require_correction: bool,
}

impl Default for RecodeAudio {
    fn default() -> Self {
        Self {
            target: AudioCodec::WavPack,
            hybrid_bitrate: None,
            require_correction: false,
        }
    }
}

impl RecodeAudio {
    fn hybrid(&self) -> bool {
        self.target == AudioCodec::WavPack && self.hybrid_bitrate.is_some()
    }

    /// Splits inputs into the primary file, its codec and an optional companion.
    fn classify<'a>(inputs: &'a [EntryRef]) -> Option<(&'a EntryRef, AudioCodec, Option<&'a EntryRef>)> {
        match inputs {
            [primary] => Some((primary, AudioCodec::from_extension(&entry_extension(primary)?)?, None)),
            [primary, companion] => {
                let codec = AudioCodec::from_extension(&entry_extension(primary)?)?;
                let expected = codec.companion_extension()?;
                let matches = entry_extension(companion).as_deref() == Some(expected)
                    && utils::file_stem(companion.key())
                        .eq_ignore_ascii_case(utils::file_stem(primary.key()));
                matches.then_some((primary, codec, Some(companion)))
            }
            _ => None,
        }
    }
}

/// Files copied into a scratch directory, removed on drop.
#[derive(Debug, Default)]
struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    fn stage(&mut self, entry: &EntryRef, path: PathBuf) -> io::Result<PathBuf> {
        let mut reader = entry.open()?;
        self.paths.push(path.clone());
        let mut file = File::create(&path)?;
        io::copy(&mut reader, &mut file)?;
        Ok(path)
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = utils::remove_file_if_exists(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove staged file");
            }
        }
    }
}

impl FileOperation for RecodeAudio {
    const KIND: OperationKind = OperationKind::RecodeAudio;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let (primary, codec, _) = Self::classify(inputs)?;
        if codec == self.target {
            return None;
        }

        let key = primary.key();
        let stem = utils::file_stem(key);
        let mut outputs = vec![utils::sibling_key(key, &format!("{stem}.{}", self.target.extension()))];
        if self.hybrid() {
            outputs.push(utils::sibling_key(key, &format!("{stem}.wvc")));
        }
        Some(outputs)
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let (primary, source, companion) = Self::classify(inputs)
            .filter(|(_, codec, _)| *codec != self.target)
            .ok_or_else(|| OperationError::not_applicable(Self::KIND.as_str()))?;
        OperationError::check_outputs(1 + usize::from(self.hybrid()), outputs.len())?;

        let companion_ext = source.companion_extension();
        let companion = match companion_ext {
            Some(ext) => companion.or_else(|| ctx.find_companion(primary.key(), ext)),
            None => None,
        };
        if let (Some(ext), None, true) = (companion_ext, companion, self.require_correction) {
            return Err(OperationError::MissingCompanion {
                primary: primary.key().to_string(),
                companion: format!("{}.{ext}", utils::file_stem(primary.key())),
            });
        }

        let mut staged = StagedFiles::default();
        let source_path = match (primary.local_path(), companion) {
            (Some(path), None) => path.to_path_buf(),
            _ => {
                let dir = ctx.create_scratch_dir()?;
                let name = primary.file_name();
                let path = staged.stage(primary, dir.join(name))?;
                if let (Some(companion), Some(ext)) = (companion, companion_ext) {
                    let companion_name = format!("{}.{ext}", utils::file_stem(name));
                    staged.stage(companion, dir.join(companion_name))?;
                }
                path
            }
        };

        let decoder = ctx.codecs().codec(source)?;
        let encoder = ctx.codecs().codec(self.target)?;
        let options = EncodeOptions {
            hybrid_bitrate: if self.hybrid() { self.hybrid_bitrate } else { None },
        };
        info!(
            key = primary.key(),
            from = %source,
            to = %self.target,
            companion = companion.is_some(),
            "Recoding audio"
        );

        utils::ensure_parent_dirs(outputs)?;
        let mut pcm = decoder.decode(&source_path)?;
        let encoded = encoder.encode(&mut pcm, &outputs[0], &options);
        let decoded = pcm.finish();
        encoded?;
        decoded?;

        if self.hybrid() {
            move_correction_file(&outputs[0], &outputs[1])?;
        }
        Ok(())
    }
}

/// WavPack writes the correction file next to the main output.
fn move_correction_file(main: &Path, expected: &Path) -> Result<(), OperationError> {
    let written = main.with_extension("wvc");
    if written != expected && written.exists() {
        debug!(from = %written.display(), to = %expected.display(), "Moving correction file");
        std::fs::rename(&written, expected)?;
    }
    if !expected.exists() {
        return Err(OperationError::MissingCompanion {
            primary: display_name(main),
            companion: display_name(expected),
        });
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

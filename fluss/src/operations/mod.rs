//! Built-in file operations.
//!
//! Each operation kind is a struct holding its configuration and
//! implementing [`FileOperation`]. [`Operation`] is the tagged union stored
//! in a stage; it serializes as `{"kind": "...", ...}` so hosts can persist
//! and edit configurations.

mod cut_cover;
mod embed_metadata;
mod fix_cuesheet;
mod fix_encoding;
mod imaging;
mod pass_through;
mod recode_audio;
mod recode_image;

pub use cut_cover::{CropRegion, CutCover};
pub use embed_metadata::EmbedMetadata;
pub use fix_cuesheet::FixCuesheet;
pub use fix_encoding::FixEncoding;
pub use pass_through::PassThrough;
pub use recode_audio::RecodeAudio;
pub use recode_image::RecodeImage;

pub(crate) use fix_encoding::decode_text;

use crate::archive::EntryRef;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The capability contract of a single operation kind.
pub trait FileOperation {
    /// The kind implemented by this type.
    const KIND: OperationKind;

    /// Checks whether the operation applies to `inputs` and proposes output
    /// keys, ordered as `execute` expects them.
    ///
    /// Never writes files. May read entry content and store the configuration
    /// it derives from it in `self`.
    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>>;

    /// Reads `inputs` and writes `outputs`.
    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> Result<(), OperationError>;
}

/// Identifies an operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Byte-for-byte copy.
    PassThrough,
    /// Re-encodes a text file as UTF-8.
    FixEncoding,
    /// Points cue sheet `FILE` lines at present audio files.
    FixCuesheet,
    /// Converts audio between codecs.
    RecodeAudio,
    /// Converts images between formats.
    RecodeImage,
    /// Crops and scales a cover image.
    CutCover,
    /// Embeds cue sheet and cover into an audio file's tags.
    EmbedMetadata,
}

impl OperationKind {
    /// All kinds in registry order.
    pub const ALL: [Self; 7] = [
        Self::PassThrough,
        Self::FixEncoding,
        Self::FixCuesheet,
        Self::RecodeAudio,
        Self::RecodeImage,
        Self::CutCover,
        Self::EmbedMetadata,
    ];

    /// Returns the serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::FixEncoding => "fix_encoding",
            Self::FixCuesheet => "fix_cuesheet",
            Self::RecodeAudio => "recode_audio",
            Self::RecodeImage => "recode_image",
            Self::CutCover => "cut_cover",
            Self::EmbedMetadata => "embed_metadata",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// See [`PassThrough`].
    PassThrough(PassThrough),
    /// See [`FixEncoding`].
    FixEncoding(FixEncoding),
    /// See [`FixCuesheet`].
    FixCuesheet(FixCuesheet),
    /// See [`RecodeAudio`].
    RecodeAudio(RecodeAudio),
    /// See [`RecodeImage`].
    RecodeImage(RecodeImage),
    /// See [`CutCover`].
    CutCover(CutCover),
    /// See [`EmbedMetadata`].
    EmbedMetadata(EmbedMetadata),
}

macro_rules! dispatch {
    ($self:expr, $op:ident => $body:expr) => {
        match $self {
            Operation::PassThrough($op) => $body,
            Operation::FixEncoding($op) => $body,
            Operation::FixCuesheet($op) => $body,
            Operation::RecodeAudio($op) => $body,
            Operation::RecodeImage($op) => $body,
            Operation::CutCover($op) => $body,
            Operation::EmbedMetadata($op) => $body,
        }
    };
}

impl Operation {
    /// Creates an operation of `kind` with default configuration.
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        match kind {
            OperationKind::PassThrough => Self::PassThrough(PassThrough::default()),
            OperationKind::FixEncoding => Self::FixEncoding(FixEncoding::default()),
            OperationKind::FixCuesheet => Self::FixCuesheet(FixCuesheet::default()),
            OperationKind::RecodeAudio => Self::RecodeAudio(RecodeAudio::default()),
            OperationKind::RecodeImage => Self::RecodeImage(RecodeImage::default()),
            OperationKind::CutCover => Self::CutCover(CutCover::default()),
            OperationKind::EmbedMetadata => Self::EmbedMetadata(EmbedMetadata::default()),
        }
    }

    /// Returns the kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::PassThrough(_) => PassThrough::KIND,
            Self::FixEncoding(_) => FixEncoding::KIND,
            Self::FixCuesheet(_) => FixCuesheet::KIND,
            Self::RecodeAudio(_) => RecodeAudio::KIND,
            Self::RecodeImage(_) => RecodeImage::KIND,
            Self::CutCover(_) => CutCover::KIND,
            Self::EmbedMetadata(_) => EmbedMetadata::KIND,
        }
    }

    /// See [`FileOperation::pass`].
    pub fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        dispatch!(self, op => op.pass(inputs))
    }

    /// See [`FileOperation::execute`].
    pub fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        dispatch!(self, op => op.execute(inputs, outputs, ctx))
    }
}

/// Returns the lowercase extension of an entry key.
pub(crate) fn entry_extension(entry: &EntryRef) -> Option<String> {
    crate::utils::extension(entry.key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(Operation::new(kind).kind(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_operation_serializes_with_kind_tag() {
        let op = Operation::new(OperationKind::RecodeImage);
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["kind"], "recode_image");
        assert_eq!(value["target"], "png");
        assert_eq!(value["jpeg_quality"], 75);
    }

    #[test]
    fn test_operation_accepts_partial_config() {
        let op: Operation =
            serde_json::from_str(r#"{"kind":"recode_audio","target":"flac"}"#).unwrap();
        match op {
            Operation::RecodeAudio(recode) => {
                assert_eq!(recode.target, crate::codecs::AudioCodec::Flac);
                assert_eq!(recode.hybrid_bitrate, None);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }
}

//! Codec collaborators.
//!
//! This module provides:
//! - Audio and image format detection by extension
//! - The PCM codec contract used by audio recoding
//! - A tool-backed codec provider driven by configured tool paths

mod audio;
mod formats;
pub(crate) mod process;

pub use audio::{
    CodecProvider, DecodeStream, EncodeOptions, ExternalCodecs, PcmCodec, ToolCodec, WaveCodec,
};
pub use formats::{is_cue_audio, AudioCodec, ImageFormat, CUE_AUDIO_EXTENSIONS};
pub use process::RunningTool;

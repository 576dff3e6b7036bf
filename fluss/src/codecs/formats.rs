//! File formats recognized by the built-in operations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio codecs the recode operation can decode and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    /// RIFF WAVE, handled in-process.
    Wave,
    /// WavPack (`.wv`, optional `.wvc` correction file).
    WavPack,
    /// True Audio (`.tta`).
    TrueAudio,
    /// Free Lossless Audio Codec (`.flac`).
    Flac,
}

impl AudioCodec {
    /// All codecs in declaration order.
    pub const ALL: [Self; 4] = [Self::Wave, Self::WavPack, Self::TrueAudio, Self::Flac];

    /// Parses a lowercase extension without the dot.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "wav" => Some(Self::Wave),
            "wv" => Some(Self::WavPack),
            "tta" => Some(Self::TrueAudio),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// Returns the file extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wave => "wav",
            Self::WavPack => "wv",
            Self::TrueAudio => "tta",
            Self::Flac => "flac",
        }
    }

    /// Returns the extension of the companion file, if the codec has one.
    #[must_use]
    pub const fn companion_extension(self) -> Option<&'static str> {
        match self {
            Self::WavPack => Some("wvc"),
            _ => None,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wave => write!(f, "wave"),
            Self::WavPack => write!(f, "wavpack"),
            Self::TrueAudio => write!(f, "tta"),
            Self::Flac => write!(f, "flac"),
        }
    }
}

/// Extensions a cue sheet `FILE` directive may point to.
pub const CUE_AUDIO_EXTENSIONS: [&str; 6] = ["flac", "wv", "tta", "wav", "ape", "tak"];

/// Returns true for extensions that hold audio a cue sheet can reference.
#[must_use]
pub fn is_cue_audio(ext: &str) -> bool {
    CUE_AUDIO_EXTENSIONS.contains(&ext)
}

/// Image formats handled by the image operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Windows bitmap.
    Bmp,
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// TIFF.
    Tiff,
}

impl Default for ImageFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl ImageFormat {
    /// Parses a lowercase extension without the dot.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.') {
            "bmp" => Some(Self::Bmp),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Returns the preferred extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Bmp => "bmp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }

    /// Returns the MIME type.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Bmp => "image/bmp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
        }
    }

    /// Returns the matching `image` crate format.
    #[must_use]
    pub const fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

//! Recording fakes for the codec and tag collaborators.

use crate::codecs::{AudioCodec, CodecProvider, DecodeStream, EncodeOptions, PcmCodec};
use crate::errors::OperationError;
use crate::tags::{TagContainer, TagEditor};
use parking_lot::Mutex;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A call made through [`FakeCodecs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecCall {
    /// A decode of `input`.
    Decode {
        /// Codec asked to decode.
        codec: AudioCodec,
        /// File handed to the decoder.
        input: PathBuf,
        /// Whether a `.wvc` file sat next to the input at decode time.
        companion_present: bool,
    },
    /// An encode into `output`.
    Encode {
        /// Codec asked to encode.
        codec: AudioCodec,
        /// Destination file.
        output: PathBuf,
        /// Encoder settings.
        options: EncodeOptions,
    },
}

type EncodeHook = Arc<dyn Fn(AudioCodec) + Send + Sync>;

/// An in-process codec provider.
///
/// Encoded files are the PCM bytes prefixed with a `FAKE:<codec>` line, so
/// tests can tell which codec produced a file. Wave files stay raw PCM.
#[derive(Clone, Default)]
pub struct FakeCodecs {
    calls: Arc<Mutex<Vec<CodecCall>>>,
    failing: Vec<AudioCodec>,
    hook: Option<EncodeHook>,
    skip_correction: bool,
}

impl FakeCodecs {
    /// Creates a provider that succeeds for every codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every encode into `codec` fail like a crashed tool.
    #[must_use]
    pub fn failing_encode(mut self, codec: AudioCodec) -> Self {
        self.failing.push(codec);
        self
    }

    /// Makes hybrid WavPack encodes write no `.wvc` file.
    #[must_use]
    pub fn without_correction_files(mut self) -> Self {
        self.skip_correction = true;
        self
    }

    /// Runs `hook` at the start of every encode.
    #[must_use]
    pub fn with_encode_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(AudioCodec) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Returns the bytes this provider writes when encoding `pcm` as `codec`.
    #[must_use]
    pub fn encoded(codec: AudioCodec, pcm: &[u8]) -> Vec<u8> {
        if codec == AudioCodec::Wave {
            return pcm.to_vec();
        }
        let mut out = format!("FAKE:{codec}\n").into_bytes();
        out.extend_from_slice(pcm);
        out
    }

    /// Returns the calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CodecCall> {
        self.calls.lock().clone()
    }
}

impl fmt::Debug for FakeCodecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeCodecs")
            .field("calls", &self.calls.lock().len())
            .field("failing", &self.failing)
            .finish_non_exhaustive()
    }
}

impl CodecProvider for FakeCodecs {
    fn codec(&self, codec: AudioCodec) -> Result<Box<dyn PcmCodec>, OperationError> {
        Ok(Box::new(FakeCodec {
            codec,
            provider: self.clone(),
        }))
    }
}

#[derive(Debug)]
struct FakeCodec {
    codec: AudioCodec,
    provider: FakeCodecs,
}

impl PcmCodec for FakeCodec {
    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn decode(&self, input: &Path) -> Result<DecodeStream, OperationError> {
        self.provider.calls.lock().push(CodecCall::Decode {
            codec: self.codec,
            input: input.to_path_buf(),
            companion_present: input.with_extension("wvc").exists(),
        });

        let data = std::fs::read(input)?;
        let header = format!("FAKE:{}\n", self.codec);
        let pcm = match data.strip_prefix(header.as_bytes()) {
            Some(pcm) => pcm.to_vec(),
            None if self.codec == AudioCodec::Wave => data,
            None => {
                return Err(OperationError::external_tool(
                    self.codec.to_string(),
                    Some(1),
                    "not a fake stream",
                ))
            }
        };
        Ok(DecodeStream::from_reader(Cursor::new(pcm)))
    }

    fn encode(
        &self,
        pcm: &mut dyn Read,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<(), OperationError> {
        self.provider.calls.lock().push(CodecCall::Encode {
            codec: self.codec,
            output: output.to_path_buf(),
            options: *options,
        });
        if let Some(hook) = &self.provider.hook {
            hook(self.codec);
        }
        if self.provider.failing.contains(&self.codec) {
            return Err(OperationError::external_tool(
                self.codec.to_string(),
                Some(2),
                "simulated encoder crash",
            ));
        }

        let mut data = Vec::new();
        pcm.read_to_end(&mut data)?;
        std::fs::File::create(output)?.write_all(&FakeCodecs::encoded(self.codec, &data))?;
        if self.codec == AudioCodec::WavPack
            && options.hybrid_bitrate.is_some()
            && !self.provider.skip_correction
        {
            std::fs::write(output.with_extension("wvc"), b"FAKE:correction\n")?;
        }
        Ok(())
    }
}

/// Tags written through [`RecordingTagEditor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTags {
    /// The tagged file.
    pub path: PathBuf,
    /// Text fields in the order they were set.
    pub text: Vec<(String, String)>,
    /// Front cover bytes and declared MIME type.
    pub cover: Option<(Vec<u8>, String)>,
}

/// A tag editor that records saved containers instead of writing files.
#[derive(Debug, Clone, Default)]
pub struct RecordingTagEditor {
    saved: Arc<Mutex<Vec<SavedTags>>>,
}

impl RecordingTagEditor {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every saved container.
    #[must_use]
    pub fn saved(&self) -> Vec<SavedTags> {
        self.saved.lock().clone()
    }
}

impl TagEditor for RecordingTagEditor {
    fn open(&self, path: &Path) -> Result<Box<dyn TagContainer>, OperationError> {
        if !path.exists() {
            return Err(OperationError::Tag(format!("{} does not exist", path.display())));
        }
        Ok(Box::new(RecordingContainer {
            tags: SavedTags {
                path: path.to_path_buf(),
                text: Vec::new(),
                cover: None,
            },
            sink: Arc::clone(&self.saved),
        }))
    }
}

struct RecordingContainer {
    tags: SavedTags,
    sink: Arc<Mutex<Vec<SavedTags>>>,
}

impl TagContainer for RecordingContainer {
    fn set_text(&mut self, name: &str, value: &str) {
        self.tags.text.push((name.to_string(), value.to_string()));
    }

    fn set_front_cover(&mut self, data: &[u8], mime_type: &str) -> Result<(), OperationError> {
        self.tags.cover = Some((data.to_vec(), mime_type.to_string()));
        Ok(())
    }

    fn save(self: Box<Self>) -> Result<(), OperationError> {
        self.sink.lock().push(self.tags);
        Ok(())
    }
}

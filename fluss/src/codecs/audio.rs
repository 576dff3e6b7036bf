//! PCM codec contract and the default tool-backed implementation.

use super::formats::AudioCodec;
use super::process::RunningTool;
use crate::config::{Tool, ToolPaths};
use crate::errors::OperationError;
use std::ffi::OsString;
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

/// Encoder settings that only some codecs honor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// WavPack hybrid bitrate in kbps; writes a `.wvc` correction file.
    pub hybrid_bitrate: Option<u32>,
}

/// A decoded PCM (WAV) byte stream.
///
/// Call [`DecodeStream::finish`] after consuming it to surface decoder
/// failures; a dropped stream kills its decoder.
pub struct DecodeStream {
    reader: Box<dyn Read + Send>,
    process: Option<RunningTool>,
}

impl DecodeStream {
    /// Wraps an in-process reader.
    #[must_use]
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            process: None,
        }
    }

    pub(crate) fn from_tool(mut tool: RunningTool) -> Result<Self, OperationError> {
        let stdout = tool.take_stdout().ok_or_else(|| {
            OperationError::external_tool(tool.program(), None, "stdout not captured")
        })?;
        Ok(Self {
            reader: Box::new(stdout),
            process: Some(tool),
        })
    }

    /// Closes the stream and waits for the decoder to exit.
    pub fn finish(self) -> Result<(), OperationError> {
        let Self { reader, process } = self;
        drop(reader);
        match process {
            Some(tool) => tool.wait(),
            None => Ok(()),
        }
    }
}

impl Read for DecodeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Debug for DecodeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeStream")
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

/// Converts between a codec's files and a PCM stream.
pub trait PcmCodec: Send + Sync + Debug {
    /// Returns the codec this implementation handles.
    fn codec(&self) -> AudioCodec;

    /// Opens a PCM stream decoded from `input`.
    fn decode(&self, input: &Path) -> Result<DecodeStream, OperationError>;

    /// Encodes `pcm` into `output`.
    fn encode(
        &self,
        pcm: &mut dyn Read,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<(), OperationError>;
}

/// Resolves codec implementations for a run.
pub trait CodecProvider: Send + Sync + Debug {
    /// Returns the implementation of `codec`.
    fn codec(&self, codec: AudioCodec) -> Result<Box<dyn PcmCodec>, OperationError>;
}

/// WAV files are already PCM streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaveCodec;

impl PcmCodec for WaveCodec {
    fn codec(&self) -> AudioCodec {
        AudioCodec::Wave
    }

    fn decode(&self, input: &Path) -> Result<DecodeStream, OperationError> {
        Ok(DecodeStream::from_reader(File::open(input)?))
    }

    fn encode(
        &self,
        pcm: &mut dyn Read,
        output: &Path,
        _options: &EncodeOptions,
    ) -> Result<(), OperationError> {
        let mut file = File::create(output)?;
        io::copy(pcm, &mut file)?;
        Ok(())
    }
}

/// A codec backed by command-line tools.
#[derive(Debug, Clone)]
pub struct ToolCodec {
    codec: AudioCodec,
    tools: ToolPaths,
}

impl ToolCodec {
    /// Creates a tool-backed codec.
    #[must_use]
    pub const fn new(codec: AudioCodec, tools: ToolPaths) -> Self {
        Self { codec, tools }
    }

    fn decode_command(&self, input: &Path) -> Result<(Tool, Vec<OsString>), OperationError> {
        let input = input.as_os_str().to_os_string();
        let (tool, args) = match self.codec {
            AudioCodec::WavPack => (Tool::WvUnpack, vec!["-q".into(), input, "-".into()]),
            AudioCodec::TrueAudio => (Tool::Tta, vec!["-d".into(), input, "-".into()]),
            AudioCodec::Flac => (Tool::Flac, vec!["-d".into(), "-c".into(), "-s".into(), input]),
            AudioCodec::Wave => return Err(OperationError::not_applicable("wave tool decoder")),
        };
        Ok((tool, args))
    }

    fn encode_command(
        &self,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<(Tool, Vec<OsString>), OperationError> {
        let output = output.as_os_str().to_os_string();
        let (tool, args) = match self.codec {
            AudioCodec::WavPack => {
                let mut args: Vec<OsString> = vec!["-q".into(), "-y".into(), "-m".into()];
                if let Some(kbps) = options.hybrid_bitrate {
                    args.push(format!("-b{kbps}").into());
                    args.push("-c".into());
                }
                args.extend(["-".into(), output]);
                (Tool::WavPack, args)
            }
            AudioCodec::TrueAudio => (Tool::Tta, vec!["-e".into(), "-".into(), output]),
            AudioCodec::Flac => (
                Tool::Flac,
                vec!["-s".into(), "-f".into(), "-o".into(), output, "-".into()],
            ),
            AudioCodec::Wave => return Err(OperationError::not_applicable("wave tool encoder")),
        };
        Ok((tool, args))
    }
}

impl PcmCodec for ToolCodec {
    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn decode(&self, input: &Path) -> Result<DecodeStream, OperationError> {
        let (tool, args) = self.decode_command(input)?;
        let program = self.tools.require(tool)?;
        debug!(codec = %self.codec, input = %input.display(), "Decoding");
        DecodeStream::from_tool(RunningTool::spawn(&program, &args, false, true)?)
    }

    fn encode(
        &self,
        pcm: &mut dyn Read,
        output: &Path,
        options: &EncodeOptions,
    ) -> Result<(), OperationError> {
        let (tool, args) = self.encode_command(output, options)?;
        let program = self.tools.require(tool)?;
        debug!(codec = %self.codec, output = %output.display(), "Encoding");

        let mut running = RunningTool::spawn(&program, &args, true, false)?;
        let copied = match running.take_stdin() {
            Some(mut stdin) => io::copy(pcm, &mut stdin).map(|_| ()),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured")),
        };
        // A tool failure explains a broken pipe better than the pipe error does.
        running.wait()?;
        copied.map_err(OperationError::from)
    }
}

/// Default provider: WAV in-process, everything else through [`ToolCodec`].
#[derive(Debug, Clone, Default)]
pub struct ExternalCodecs {
    tools: ToolPaths,
}

impl ExternalCodecs {
    /// Creates a provider using the given tool paths.
    #[must_use]
    pub const fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }
}

impl CodecProvider for ExternalCodecs {
    fn codec(&self, codec: AudioCodec) -> Result<Box<dyn PcmCodec>, OperationError> {
        match codec {
            AudioCodec::Wave => Ok(Box::new(WaveCodec)),
            other => Ok(Box::new(ToolCodec::new(other, self.tools.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_wave_codec_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.wav");
        let mut pcm = Cursor::new(b"RIFF....WAVEfmt ".to_vec());

        WaveCodec.encode(&mut pcm, &path, &EncodeOptions::default()).unwrap();
        let mut stream = WaveCodec.decode(&path).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        stream.finish().unwrap();

        assert_eq!(out, b"RIFF....WAVEfmt ");
    }

    #[test]
    fn test_wavpack_hybrid_arguments() {
        let codec = ToolCodec::new(AudioCodec::WavPack, ToolPaths::default());
        let (tool, args) = codec
            .encode_command(Path::new("out.wv"), &EncodeOptions { hybrid_bitrate: Some(192) })
            .unwrap();

        assert_eq!(tool, Tool::WavPack);
        assert!(args.contains(&OsString::from("-b192")));
        assert!(args.contains(&OsString::from("-c")));
        assert_eq!(args.last(), Some(&OsString::from("out.wv")));
    }

    #[test]
    fn test_unconfigured_tool() {
        let codec = ToolCodec::new(AudioCodec::TrueAudio, ToolPaths::default());
        let err = codec.decode(Path::new("a.tta")).unwrap_err();
        assert!(matches!(err, OperationError::ToolNotConfigured { ref tool } if tool == "tta"));
    }

    #[test]
    fn test_provider_uses_in_process_wave() {
        let provider = ExternalCodecs::default();
        assert_eq!(provider.codec(AudioCodec::Wave).unwrap().codec(), AudioCodec::Wave);
        assert_eq!(provider.codec(AudioCodec::Flac).unwrap().codec(), AudioCodec::Flac);
    }
}

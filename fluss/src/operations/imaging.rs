//! Image encoding shared by the image operations.

use crate::codecs::{ImageFormat, RunningTool};
use crate::config::Tool;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageReader};
use std::ffi::OsStr;
use std::io::{self, Cursor, Read};
use std::path::Path;
use tracing::debug;

/// Reads the pixel dimensions from an encoded image header.
pub(super) fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

const HEADER_CHUNK: usize = 4096;

/// Reads the pixel dimensions from the start of `reader`, stopping as soon
/// as the header has been parsed.
pub(super) fn stream_dimensions(mut reader: impl Read) -> io::Result<Option<(u32, u32)>> {
    let mut head = Vec::new();
    let mut chunk = [0u8; HEADER_CHUNK];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        head.extend_from_slice(&chunk[..read]);
        if let Some(dimensions) = dimensions(&head) {
            return Ok(Some(dimensions));
        }
        if head.len() >= 32 && image::guess_format(&head).is_err() {
            return Ok(None);
        }
    }
}

/// Encodes `image` in `format`. `quality` applies to JPEG only.
pub(super) fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, OperationError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            image
                .to_rgb8()
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;
        }
        other => image.write_to(&mut Cursor::new(&mut buf), other.to_image_format())?,
    }
    Ok(buf)
}

/// Losslessly shrinks an encoded file in place.
///
/// PNG is recompressed in-process. JPEG goes through `jpegtran` when it is
/// configured and is left alone otherwise.
pub(super) fn optimize(
    path: &Path,
    format: ImageFormat,
    ctx: &ExecutionContext,
) -> Result<(), OperationError> {
    match format {
        ImageFormat::Png => {
            let image = image::open(path)?;
            let mut buf = Vec::new();
            let encoder = PngEncoder::new_with_quality(
                &mut buf,
                CompressionType::Best,
                FilterType::Adaptive,
            );
            image.write_with_encoder(encoder)?;
            std::fs::write(path, buf)?;
        }
        ImageFormat::Jpeg => {
            let Some(jpegtran) = ctx.tools().get(Tool::JpegTran) else {
                debug!(path = %path.display(), "jpegtran not configured, skipping optimization");
                return Ok(());
            };
            let optimized = path.with_extension("opt.jpg");
            let args = [
                OsStr::new("-copy"),
                OsStr::new("none"),
                OsStr::new("-optimize"),
                OsStr::new("-outfile"),
                optimized.as_os_str(),
                path.as_os_str(),
            ];
            let result = RunningTool::spawn(&jpegtran, &args, false, false)?.wait();
            if let Err(e) = result {
                crate::utils::remove_file_if_exists(&optimized)?;
                return Err(e);
            }
            std::fs::rename(&optimized, path)?;
        }
        ImageFormat::Bmp | ImageFormat::Tiff => {}
    }
    Ok(())
}

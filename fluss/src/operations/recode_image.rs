use super::{entry_extension, imaging, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::codecs::ImageFormat;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Converts an image to another format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecodeImage {
    /// Output format.
    pub target: ImageFormat,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
    /// Run a lossless optimization pass on the result.
    pub optimize: bool,
}

impl Default for RecodeImage {
    fn default() -> Self {
        Self {
            target: ImageFormat::Png,
            jpeg_quality: 75,
            optimize: false,
        }
    }
}

impl FileOperation for RecodeImage {
    const KIND: OperationKind = OperationKind::RecodeImage;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let [input] = inputs else {
            return None;
        };
        let source = ImageFormat::from_extension(&entry_extension(input)?)?;
        if source == self.target {
            return None;
        }

        let key = input.key();
        let name = format!("{}.{}", utils::file_stem(key), self.target.extension());
        Some(vec![utils::sibling_key(key, &name)])
    }

    fn execute(
        &self,
        inputs: &[EntryRef],
        outputs: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> Result<(), OperationError> {
        let [input] = inputs else {
            return Err(OperationError::not_applicable(Self::KIND.as_str()));
        };
        OperationError::check_outputs(1, outputs.len())?;

        let image = image::load_from_memory(&input.read_all()?)?;
        debug!(
            key = input.key(),
            width = image.width(),
            height = image.height(),
            target = ?self.target,
            "Re-encoding image"
        );
        let encoded = imaging::encode(&image, self.target, self.jpeg_quality)?;

        utils::ensure_parent_dirs(outputs)?;
        std::fs::write(&outputs[0], encoded)?;
        if self.optimize {
            imaging::optimize(&outputs[0], self.target, ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryEntry;
    use crate::config::FlussConfig;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(key: &str, data: Vec<u8>) -> EntryRef {
        Arc::new(MemoryEntry::file(key, data))
    }

    #[test]
    fn test_pass_proposes_target_extension() {
        let mut op = RecodeImage::default();
        assert_eq!(
            op.pass(&[entry("Scans/Back.BMP", Vec::new())]),
            Some(vec!["Scans/Back.png".to_string()])
        );

        let mut to_jpeg = RecodeImage {
            target: ImageFormat::Jpeg,
            ..RecodeImage::default()
        };
        assert_eq!(
            to_jpeg.pass(&[entry("front.tif", Vec::new())]),
            Some(vec!["front.jpg".to_string()])
        );
    }

    #[test]
    fn test_pass_skips_same_format() {
        let mut op = RecodeImage::default();
        assert_eq!(op.pass(&[entry("front.png", Vec::new())]), None);
        assert_eq!(op.pass(&[entry("front.gif", Vec::new())]), None);
        assert_eq!(op.pass(&[entry("a.bmp", Vec::new()), entry("b.bmp", Vec::new())]), None);
    }

    #[test]
    fn test_execute_converts_bmp_to_png() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("Scans/back.png");
        let ctx = ExecutionContext::new(&FlussConfig::default());
        let op = RecodeImage {
            optimize: true,
            ..RecodeImage::default()
        };

        op.execute(
            &[entry("Scans/back.bmp", fixtures::image_bytes(ImageFormat::Bmp, 32, 24))],
            &[out.clone()],
            &ctx,
        )
        .unwrap();

        let written = std::fs::read(&out).unwrap();
        assert_eq!(
            image::guess_format(&written).unwrap(),
            image::ImageFormat::Png
        );
        assert_eq!(imaging::dimensions(&written), Some((32, 24)));
    }

    #[test]
    fn test_execute_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let ctx = ExecutionContext::new(&FlussConfig::default());
        let err = RecodeImage::default()
            .execute(
                &[entry("broken.bmp", b"BM????".to_vec())],
                &[dir.path().join("broken.png")],
                &ctx,
            )
            .unwrap_err();
        assert!(matches!(err, OperationError::Image(_)));
    }
}

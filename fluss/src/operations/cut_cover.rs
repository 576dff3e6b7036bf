use super::{entry_extension, imaging, FileOperation, OperationKind};
use crate::archive::EntryRef;
use crate::codecs::ImageFormat;
use crate::context::ExecutionContext;
use crate::errors::OperationError;
use crate::utils;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const COVER_NAME: &str = "cover.jpg";

/// Margin trimmed from the shorter side by the automatic crop, in percent.
const AUTO_CROP_MARGIN_PERCENT: u32 = 1;

/// A rectangle in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl CropRegion {
    /// Centered square slightly smaller than the shorter side.
    #[must_use]
    pub const fn centered_square(width: u32, height: u32) -> Self {
        let min = if width < height { width } else { height };
        let size = min - min * AUTO_CROP_MARGIN_PERCENT / 100;
        Self {
            x: (width - size) / 2,
            y: (height - size) / 2,
            width: size,
            height: size,
        }
    }

    const fn fits(&self, width: u32, height: u32) -> bool {
        let right = match self.x.checked_add(self.width) {
            Some(right) => right,
            None => return false,
        };
        let bottom = match self.y.checked_add(self.height) {
            Some(bottom) => bottom,
            None => return false,
        };
        self.width > 0 && self.height > 0 && right <= width && bottom <= height
    }
}

/// Crops a cover scan to a square and writes it as `cover.jpg`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutCover {
    /// Region to keep; derived from the image when absent.
    pub crop: Option<CropRegion>,
    /// Edge length of the square output in pixels.
    pub output_size: u32,
    /// JPEG quality, 1 to 100.
    pub jpeg_quality: u8,
    /// Run a lossless optimization pass on the result.
    pub optimize: bool,
}

impl Default for CutCover {
    fn default() -> Self {
        Self {
            crop: None,
            output_size: 600,
            jpeg_quality: 90,
            optimize: true,
        }
    }
}

impl FileOperation for CutCover {
    const KIND: OperationKind = OperationKind::CutCover;

    fn pass(&mut self, inputs: &[EntryRef]) -> Option<Vec<String>> {
        let [input] = inputs else {
            return None;
        };
        ImageFormat::from_extension(&entry_extension(input)?)?;

        if self.crop.is_none() {
            let (width, height) = imaging::stream_dimensions(input.open().ok()?).ok()??;
            self.crop = Some(CropRegion::centered_square(width, height));
        }
        Some(vec![utils::sibling_key(input.key(), COVER_NAME)])
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
        let (width, height) = (image.width(), image.height());
        let crop = self
            .crop
            .unwrap_or_else(|| CropRegion::centered_square(width, height));
        if !crop.fits(width, height) {
            return Err(OperationError::InvalidInput(format!(
                "crop {crop:?} exceeds {width}x{height} image '{}'",
                input.key()
            )));
        }
        debug!(key = input.key(), ?crop, size = self.output_size, "Cutting cover");

        let mut cover = image.crop_imm(crop.x, crop.y, crop.width, crop.height);
        if self.output_size > 0 {
            cover = cover.resize_exact(self.output_size, self.output_size, FilterType::Lanczos3);
        }
        let encoded = imaging::encode(&cover, ImageFormat::Jpeg, self.jpeg_quality)?;

        utils::ensure_parent_dirs(outputs)?;
        std::fs::write(&outputs[0], encoded)?;
        if self.optimize {
            imaging::optimize(&outputs[0], ImageFormat::Jpeg, ctx)?;
        }
        Ok(())
    }
}

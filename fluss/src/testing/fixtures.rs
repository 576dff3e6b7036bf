//! Fixture builders.

use crate::archive::{EntryRef, MemoryEntry};
use crate::codecs::ImageFormat;
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;

/// Wraps bytes in an in-memory archive entry.
#[must_use]
pub fn entry(key: &str, data: impl Into<Vec<u8>>) -> EntryRef {
    Arc::new(MemoryEntry::file(key, data))
}

/// Encodes a `width` x `height` gradient in `format`.
///
/// # Panics
///
/// Panics if the image crate cannot encode the format.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::expect_used)]
pub fn image_bytes(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(pixels)
        .write_to(&mut out, format.to_image_format())
        .expect("fixture image encodes");
    out.into_inner()
}

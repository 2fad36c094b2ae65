//! Render backend contract and the bitmap format it produces
//!
//! The page renderer never decodes content itself. It asks a
//! [`RenderBackend`] for one unit (page, image, thumbnail) at one zoom
//! level and gets back a fixed-format [`Bitmap`].

use crate::layout::{PageLayout, ZoomLevel};
use thiserror::Error;

/// Bytes per pixel of every bitmap (RGBA8)
pub const BYTES_PER_PIXEL: u32 = 4;

/// Errors raised while opening or rendering content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unit {index} out of range (document has {count})")]
    UnitOutOfRange { index: usize, count: usize },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("document has no renderable units")]
    Empty,

    #[error("bitmap buffer too small: {actual} bytes for {width}x{height} (stride {stride})")]
    BufferTooSmall {
        width: u32,
        height: u32,
        stride: u32,
        actual: usize,
    },
}

/// Rendered unit in RGBA8
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Bytes per row (at least `width * 4`)
    pub stride: u32,

    /// Pixel samples, row-major, `stride * height` bytes
    pub pixels: Vec<u8>,

    /// Whether the alpha channel carries information
    pub has_alpha: bool,
}

impl Bitmap {
    /// Wrap a tightly packed RGBA buffer
    pub fn from_rgba(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        has_alpha: bool,
    ) -> Result<Self, RenderError> {
        Self::with_stride(width, height, width * BYTES_PER_PIXEL, pixels, has_alpha)
    }

    /// Wrap an RGBA buffer whose rows are `stride` bytes apart
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        pixels: Vec<u8>,
        has_alpha: bool,
    ) -> Result<Self, RenderError> {
        let required = stride as usize * height as usize;
        if stride < width * BYTES_PER_PIXEL || pixels.len() < required {
            return Err(RenderError::BufferTooSmall {
                width,
                height,
                stride,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            pixels,
            has_alpha,
        })
    }

    /// Memory footprint of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA sample at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride as usize + (x * BYTES_PER_PIXEL) as usize;
        let sample = self.pixels.get(offset..offset + 4)?;
        Some([sample[0], sample[1], sample[2], sample[3]])
    }
}

/// Decoder for one kind of paginated or zoomable content
///
/// `open` turns loaded bytes into a document handle and its layout;
/// `render_unit` draws one unit of that handle at a zoom level. Failures
/// of `render_unit` are isolated to that unit.
pub trait RenderBackend {
    /// Opaque handle to opened content
    type Document;

    /// Parse loaded bytes into a document handle and its unit layout
    fn open(&self, bytes: &[u8]) -> Result<(Self::Document, PageLayout), RenderError>;

    /// Render `unit_index` of `document` at `zoom`
    fn render_unit(
        &self,
        document: &Self::Document,
        unit_index: usize,
        zoom: ZoomLevel,
    ) -> Result<Bitmap, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba_packs_stride() {
        let bitmap = Bitmap::from_rgba(2, 3, vec![0; 24], false).unwrap();
        assert_eq!(bitmap.stride, 8);
        assert_eq!(bitmap.byte_len(), 24);
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let result = Bitmap::from_rgba(4, 4, vec![0; 10], true);
        assert!(matches!(result, Err(RenderError::BufferTooSmall { actual: 10, .. })));
    }

    #[test]
    fn test_narrow_stride_is_rejected() {
        let result = Bitmap::with_stride(4, 1, 8, vec![0; 64], true);
        assert!(result.is_err());
    }

    #[test]
    fn test_pixel_lookup_honours_stride() {
        let mut pixels = vec![0u8; 2 * 12];
        pixels[12..16].copy_from_slice(&[1, 2, 3, 4]);
        let bitmap = Bitmap::with_stride(2, 2, 12, pixels, true).unwrap();

        assert_eq!(bitmap.pixel(0, 1), Some([1, 2, 3, 4]));
        assert_eq!(bitmap.pixel(2, 0), None);
    }

    #[test]
    fn test_error_messages() {
        let error = RenderError::UnitOutOfRange { index: 12, count: 10 };
        assert_eq!(error.to_string(), "unit 12 out of range (document has 10)");
    }
}

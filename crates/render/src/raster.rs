//! Raster image backend
//!
//! Treats a decoded image as a single-unit document. Zoom rescales the
//! image; thumbnails fit within a square edge while keeping aspect ratio.

use crate::bitmap::{Bitmap, RenderBackend, RenderError};
use crate::layout::{PageLayout, ZoomLevel};
use image::imageops::FilterType;
use image::DynamicImage;

/// Backend for PNG, JPEG, GIF and BMP content
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageBackend;

impl ImageBackend {
    pub fn new() -> Self {
        Self
    }

    /// Decode `bytes` and scale so the longer edge is at most `max_edge`
    pub fn thumbnail(&self, bytes: &[u8], max_edge: u32) -> Result<Bitmap, RenderError> {
        let image = decode(bytes)?;
        let max_edge = max_edge.max(1);
        let scaled = if image.width() <= max_edge && image.height() <= max_edge {
            image
        } else {
            image.thumbnail(max_edge, max_edge)
        };
        to_bitmap(&scaled)
    }
}

impl RenderBackend for ImageBackend {
    type Document = DynamicImage;

    fn open(&self, bytes: &[u8]) -> Result<(DynamicImage, PageLayout), RenderError> {
        let image = decode(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::Empty);
        }
        let layout = PageLayout::single(image.width() as f32, image.height() as f32);
        Ok((image, layout))
    }

    fn render_unit(
        &self,
        document: &DynamicImage,
        unit_index: usize,
        zoom: ZoomLevel,
    ) -> Result<Bitmap, RenderError> {
        if unit_index != 0 {
            return Err(RenderError::UnitOutOfRange {
                index: unit_index,
                count: 1,
            });
        }
        if zoom == ZoomLevel::ACTUAL {
            return to_bitmap(document);
        }

        let width = scaled_edge(document.width(), zoom);
        let height = scaled_edge(document.height(), zoom);
        let resized = document.resize_exact(width, height, FilterType::Triangle);
        to_bitmap(&resized)
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    image::load_from_memory(bytes).map_err(|e| RenderError::Decode(e.to_string()))
}

fn scaled_edge(edge: u32, zoom: ZoomLevel) -> u32 {
    ((edge as f32 * zoom.factor()).round() as u32).max(1)
}

fn to_bitmap(image: &DynamicImage) -> Result<Bitmap, RenderError> {
    let has_alpha = image.color().has_alpha();
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::from_rgba(width, height, rgba.into_raw(), has_alpha)
}

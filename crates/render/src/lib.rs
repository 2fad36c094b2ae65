//! Document render library
//!
//! Bitmap format, unit layout and the viewport-driven page renderer, plus
//! a raster image backend. Decoders for other paginated formats plug in
//! through [`RenderBackend`].

pub mod bitmap;
pub mod layout;
pub mod paged;
pub mod raster;

pub use bitmap::{Bitmap, RenderBackend, RenderError, BYTES_PER_PIXEL};
pub use layout::{PageLayout, UnitSize, ViewportState, ZoomBounds, ZoomLevel};
pub use paged::{
    DisplaySurface, PageCache, PageRenderer, PageRendererConfig, RenderKey, RenderReport,
    RenderState, DEFAULT_PAGE_CACHE_ENTRIES,
};
pub use raster::ImageBackend;

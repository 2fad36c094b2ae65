//! Viewport-driven page renderer
//!
//! Renders only the units of a paginated document that intersect the
//! viewport, and only once scrolling has settled. Each paginated view owns
//! one [`PageRenderer`], which moves through
//! `Idle → ScrollActive → RenderPending → Idle`:
//!
//! 1. A scroll or resize updates the viewport, re-arms the idle timer and
//!    refreshes the page indicator. Nothing is rendered yet.
//! 2. When the idle timer fires, the visible set is computed and every
//!    visible unit is taken from the cache or rendered synchronously.
//! 3. Units that left the viewport drop their displayed bitmap; the cache
//!    may still hold it.
//!
//! Rendered bitmaps are cached under `(unit index, zoom)`. A zoom change
//! clears the whole cache, since no old key can be reused at the new zoom.

use crate::bitmap::{Bitmap, RenderBackend, RenderError};
use crate::layout::{PageLayout, ViewportState, ZoomBounds, ZoomLevel};
use docshell_cache::{BoundedCache, SharedCache};
use docshell_scheduler::{SingleShotTimer, SCROLL_IDLE_INTERVAL};
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Default number of rendered units kept in a renderer's cache
pub const DEFAULT_PAGE_CACHE_ENTRIES: usize = 8;

/// Cache key of a rendered unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderKey {
    pub unit_index: usize,
    pub zoom: ZoomLevel,
}

impl RenderKey {
    pub fn new(unit_index: usize, zoom: ZoomLevel) -> Self {
        Self { unit_index, zoom }
    }
}

/// Cache of rendered units shared with the memory governor
pub type PageCache = SharedCache<RenderKey, Rc<Bitmap>>;

/// Renderer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Nothing pending
    Idle,
    /// The viewport moved and the idle timer is counting down
    ScrollActive,
    /// A render pass is running
    RenderPending,
}

/// What a unit's display surface currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum DisplaySurface {
    /// Nothing rendered (off-screen or not yet reached)
    Placeholder,
    /// A rendered bitmap
    Rendered(Rc<Bitmap>),
    /// Fallback shown when the unit failed to render
    Failed(String),
}

impl DisplaySurface {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, DisplaySurface::Placeholder)
    }

    pub fn bitmap(&self) -> Option<&Rc<Bitmap>> {
        match self {
            DisplaySurface::Rendered(bitmap) => Some(bitmap),
            _ => None,
        }
    }
}

/// Outcome of one render pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Units intersecting the viewport
    pub visible: Range<usize>,
    /// Units rendered by the backend during this pass
    pub rendered: Vec<usize>,
    /// Units served from the cache
    pub cache_hits: Vec<usize>,
    /// Units whose render failed
    pub failed: Vec<usize>,
    /// Off-screen units whose displayed bitmap was released
    pub released: usize,
}

/// Configuration for a page renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRendererConfig {
    /// Maximum number of cached rendered units
    pub cache_entries: usize,
    /// Quiet period after the last scroll before rendering
    pub idle_interval: Duration,
    /// Permitted zoom range
    pub zoom_bounds: ZoomBounds,
}

impl Default for PageRendererConfig {
    fn default() -> Self {
        Self {
            cache_entries: DEFAULT_PAGE_CACHE_ENTRIES,
            idle_interval: SCROLL_IDLE_INTERVAL,
            zoom_bounds: ZoomBounds::default(),
        }
    }
}

impl PageRendererConfig {
    pub fn with_cache_entries(mut self, entries: usize) -> Self {
        self.cache_entries = entries;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_zoom_bounds(mut self, bounds: ZoomBounds) -> Self {
        self.zoom_bounds = bounds;
        self
    }
}

/// Viewport-driven renderer for one paginated document
///
/// # Example
///
/// ```
/// use docshell_render::{
///     Bitmap, PageLayout, PageRenderer, PageRendererConfig, RenderBackend, RenderError,
///     ZoomLevel,
/// };
/// use std::time::{Duration, Instant};
///
/// struct Blank;
///
/// impl RenderBackend for Blank {
///     type Document = usize;
///
///     fn open(&self, _bytes: &[u8]) -> Result<(usize, PageLayout), RenderError> {
///         Ok((10, PageLayout::uniform(10, 80.0, 100.0, 0.0)))
///     }
///
///     fn render_unit(&self, _doc: &usize, _unit: usize, _zoom: ZoomLevel) -> Result<Bitmap, RenderError> {
///         Bitmap::from_rgba(1, 1, vec![255; 4], false)
///     }
/// }
///
/// let start = Instant::now();
/// let mut renderer = PageRenderer::new(Blank, PageRendererConfig::default());
/// renderer.open(&[], start).unwrap();
/// renderer.on_resize(start, 300.0);
/// renderer.on_scroll(start, 300.0);
///
/// let report = renderer.poll(start + Duration::from_millis(200)).unwrap();
/// assert_eq!(report.visible, 3..6);
/// ```
pub struct PageRenderer<B: RenderBackend> {
    backend: B,
    document: Option<B::Document>,
    layout: PageLayout,
    viewport: ViewportState,
    zoom: ZoomLevel,
    zoom_bounds: ZoomBounds,
    cache: PageCache,
    surfaces: Vec<DisplaySurface>,
    idle_timer: SingleShotTimer,
    state: RenderState,
    current_unit: usize,
    rendering: bool,
    decode_calls: u64,
}

impl<B: RenderBackend> PageRenderer<B> {
    /// Create a renderer with no document
    pub fn new(backend: B, config: PageRendererConfig) -> Self {
        Self {
            backend,
            document: None,
            layout: PageLayout::new(Vec::new(), 0.0),
            viewport: ViewportState::default(),
            zoom: config.zoom_bounds.clamp(ZoomLevel::ACTUAL),
            zoom_bounds: config.zoom_bounds,
            cache: BoundedCache::shared("pages", config.cache_entries),
            surfaces: Vec::new(),
            idle_timer: SingleShotTimer::new(config.idle_interval),
            state: RenderState::Idle,
            current_unit: 0,
            rendering: false,
            decode_calls: 0,
        }
    }

    /// Open loaded content and schedule the first render
    ///
    /// Replaces any previously opened document.
    pub fn open(&mut self, bytes: &[u8], now: Instant) -> Result<(), RenderError> {
        let (document, layout) = self.backend.open(bytes)?;
        if layout.is_empty() {
            return Err(RenderError::Empty);
        }
        self.set_document(document, layout, now);
        Ok(())
    }

    /// Install an already opened document and schedule the first render
    pub fn set_document(&mut self, document: B::Document, layout: PageLayout, now: Instant) {
        self.cache.borrow_mut().clear();
        self.surfaces = vec![DisplaySurface::Placeholder; layout.unit_count()];
        self.layout = layout;
        self.document = Some(document);
        self.viewport.scroll_offset = 0.0;
        self.current_unit = 0;
        self.state = RenderState::ScrollActive;
        self.idle_timer.arm(now);
    }

    /// Handle a scroll-position change
    ///
    /// Only refreshes the page indicator and re-arms the idle timer.
    pub fn on_scroll(&mut self, now: Instant, scroll_offset: f32) {
        self.viewport.scroll_offset = self.clamp_offset(scroll_offset);
        self.viewport_changed(now);
    }

    /// Handle a viewport resize
    pub fn on_resize(&mut self, now: Instant, visible_extent: f32) {
        self.viewport.visible_extent = visible_extent.max(0.0);
        self.viewport.scroll_offset = self.clamp_offset(self.viewport.scroll_offset);
        self.viewport_changed(now);
    }

    /// Scroll straight to a unit without forcing a render
    ///
    /// The normal idle path renders it once scrolling settles.
    pub fn jump_to(&mut self, now: Instant, unit_index: usize) {
        if self.layout.is_empty() {
            return;
        }
        let unit_index = unit_index.min(self.layout.unit_count() - 1);
        self.viewport.scroll_offset = self.clamp_offset(self.layout.unit_top(unit_index, self.zoom));
        self.current_unit = unit_index;
        self.state = RenderState::ScrollActive;
        self.idle_timer.arm(now);
    }

    fn viewport_changed(&mut self, now: Instant) {
        if let Some(unit) = self.layout.nearest_unit(&self.viewport, self.zoom) {
            self.current_unit = unit;
        }
        self.state = RenderState::ScrollActive;
        self.idle_timer.arm(now);
    }

    fn clamp_offset(&self, offset: f32) -> f32 {
        let max = (self.layout.total_extent(self.zoom) - self.viewport.visible_extent).max(0.0);
        offset.clamp(0.0, max)
    }

    /// Render the visible set if scrolling has settled
    pub fn poll(&mut self, now: Instant) -> Option<RenderReport> {
        if !self.idle_timer.poll(now) {
            return None;
        }
        Some(self.render_visible())
    }

    /// Change zoom, clear the cache and immediately re-render the visible set
    ///
    /// Returns `None` if the clamped zoom equals the current one.
    pub fn set_zoom(&mut self, zoom: ZoomLevel) -> Option<RenderReport> {
        let zoom = self.zoom_bounds.clamp(zoom);
        if zoom == self.zoom {
            return None;
        }

        let ratio = zoom.factor() / self.zoom.factor();
        self.zoom = zoom;
        self.cache.borrow_mut().clear();
        for surface in &mut self.surfaces {
            *surface = DisplaySurface::Placeholder;
        }
        self.viewport.scroll_offset = self.clamp_offset(self.viewport.scroll_offset * ratio);
        if let Some(unit) = self.layout.nearest_unit(&self.viewport, self.zoom) {
            self.current_unit = unit;
        }
        self.idle_timer.cancel();

        log::debug!("zoom changed to {}%", zoom.percent());
        Some(self.render_visible())
    }

    /// One zoom step in
    pub fn zoom_in(&mut self) -> Option<RenderReport> {
        self.set_zoom(self.zoom_bounds.step_in(self.zoom))
    }

    /// One zoom step out
    pub fn zoom_out(&mut self) -> Option<RenderReport> {
        self.set_zoom(self.zoom_bounds.step_out(self.zoom))
    }

    /// Render every visible unit now
    ///
    /// A pass requested while another is running returns an empty report.
    pub fn render_visible(&mut self) -> RenderReport {
        if self.rendering {
            log::debug!("render pass already running; skipping");
            return RenderReport::default();
        }
        self.rendering = true;
        self.state = RenderState::RenderPending;

        let visible = self.layout.visible_units(&self.viewport, self.zoom);
        let mut report = RenderReport {
            visible: visible.clone(),
            ..Default::default()
        };

        if self.document.is_some() {
            for unit in visible.clone() {
                self.render_unit(unit, &mut report);
            }
        }

        for (index, surface) in self.surfaces.iter_mut().enumerate() {
            if !visible.contains(&index) && !surface.is_placeholder() {
                *surface = DisplaySurface::Placeholder;
                report.released += 1;
            }
        }

        self.state = RenderState::Idle;
        self.rendering = false;
        report
    }

    fn render_unit(&mut self, unit: usize, report: &mut RenderReport) {
        let key = RenderKey::new(unit, self.zoom);

        let cached = self.cache.borrow_mut().get(&key).cloned();
        if let Some(bitmap) = cached {
            self.surfaces[unit] = DisplaySurface::Rendered(bitmap);
            report.cache_hits.push(unit);
            return;
        }

        let Some(document) = self.document.as_ref() else {
            return;
        };

        // Make room before the render so at most max_entries bitmaps are cached
        {
            let mut cache = self.cache.borrow_mut();
            if cache.len() >= cache.max_entries() {
                cache.evict_oldest(1);
            }
        }

        // The cache is not borrowed while the backend runs
        self.decode_calls += 1;
        let backend = &self.backend;
        let zoom = self.zoom;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            backend.render_unit(document, unit, zoom)
        }))
        .unwrap_or_else(|payload| {
            Err(RenderError::Decode(format!(
                "renderer panicked: {}",
                panic_message(payload.as_ref())
            )))
        });

        match outcome {
            Ok(bitmap) => {
                let bitmap = Rc::new(bitmap);
                self.cache.borrow_mut().insert(key, bitmap.clone());
                self.surfaces[unit] = DisplaySurface::Rendered(bitmap);
                report.rendered.push(unit);
            }
            Err(error) => {
                log::warn!("unit {} failed to render: {}", unit, error);
                self.surfaces[unit] = DisplaySurface::Failed(error.to_string());
                report.failed.push(unit);
            }
        }
    }

    /// Stop the timer, drop the document, cache and every displayed bitmap
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        self.idle_timer.cancel();
        self.cache.borrow_mut().clear();
        self.surfaces.clear();
        self.document = None;
        self.state = RenderState::Idle;
    }

    /// Cache of rendered units, for registration with the memory governor
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Display surface of a unit
    pub fn surface(&self, unit_index: usize) -> Option<&DisplaySurface> {
        self.surfaces.get(unit_index)
    }

    /// Every display surface, in unit order
    pub fn surfaces(&self) -> &[DisplaySurface] {
        &self.surfaces
    }

    /// Units currently intersecting the viewport
    pub fn visible_units(&self) -> Range<usize> {
        self.layout.visible_units(&self.viewport, self.zoom)
    }

    /// Unit shown by the page indicator
    pub fn current_unit(&self) -> usize {
        self.current_unit
    }

    /// Number of units in the open document
    pub fn unit_count(&self) -> usize {
        self.layout.unit_count()
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn zoom(&self) -> ZoomLevel {
        self.zoom
    }

    pub fn viewport(&self) -> ViewportState {
        self.viewport
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Whether a document is open
    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Number of backend render calls made so far
    pub fn decode_calls(&self) -> u64 {
        self.decode_calls
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Vertical page layout and viewport geometry
//!
//! Units (pages, images) are stacked top to bottom with a fixed on-screen
//! gap. Unit heights scale with zoom; the gap does not. A unit is visible
//! when its on-screen extent intersects the viewport.

use std::ops::Range;

/// Zoom level as an integer percentage (100 = actual size)
///
/// Integral so it can be part of a hashable render key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoomLevel(u32);

impl ZoomLevel {
    /// Actual size
    pub const ACTUAL: ZoomLevel = ZoomLevel(100);

    /// Create a zoom level from a percentage (minimum 1%)
    pub fn new(percent: u32) -> Self {
        Self(percent.max(1))
    }

    /// Zoom as a percentage
    pub fn percent(&self) -> u32 {
        self.0
    }

    /// Zoom as a scale factor (1.0 = actual size)
    pub fn factor(&self) -> f32 {
        self.0 as f32 / 100.0
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self::ACTUAL
    }
}

/// Permitted zoom range and step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomBounds {
    pub min: ZoomLevel,
    pub max: ZoomLevel,
    /// Percentage added or removed by one zoom-in/zoom-out step
    pub step: u32,
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            min: ZoomLevel(25),
            max: ZoomLevel(400),
            step: 25,
        }
    }
}

impl ZoomBounds {
    /// Create bounds from percentages
    pub fn new(min_percent: u32, max_percent: u32) -> Self {
        let min = ZoomLevel::new(min_percent);
        let max = ZoomLevel::new(max_percent.max(min.percent()));
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    /// Clamp a zoom level into the bounds
    pub fn clamp(&self, zoom: ZoomLevel) -> ZoomLevel {
        zoom.clamp(self.min, self.max)
    }

    /// One step larger, clamped
    pub fn step_in(&self, zoom: ZoomLevel) -> ZoomLevel {
        self.clamp(ZoomLevel::new(zoom.percent().saturating_add(self.step)))
    }

    /// One step smaller, clamped
    pub fn step_out(&self, zoom: ZoomLevel) -> ZoomLevel {
        self.clamp(ZoomLevel::new(zoom.percent().saturating_sub(self.step)))
    }
}

/// Size of one unit at 100% zoom, in layout pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSize {
    pub width: f32,
    pub height: f32,
}

impl UnitSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Current window over the scrollable content
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewportState {
    /// Distance from the top of the content to the top of the viewport
    pub scroll_offset: f32,

    /// Height of the viewport
    pub visible_extent: f32,
}

impl ViewportState {
    pub fn new(scroll_offset: f32, visible_extent: f32) -> Self {
        Self {
            scroll_offset,
            visible_extent,
        }
    }

    /// Bottom edge of the viewport in content coordinates
    pub fn bottom(&self) -> f32 {
        self.scroll_offset + self.visible_extent
    }

    /// Vertical centre of the viewport in content coordinates
    pub fn center(&self) -> f32 {
        self.scroll_offset + self.visible_extent / 2.0
    }

    /// Whether the half-open span `[top, bottom)` intersects the viewport
    pub fn intersects(&self, top: f32, bottom: f32) -> bool {
        bottom > self.scroll_offset && top < self.bottom()
    }
}

/// Vertical stack of units
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    sizes: Vec<UnitSize>,
    /// Cumulative unit heights at 100% zoom; `prefix[i]` is the sum of heights before unit `i`
    prefix: Vec<f32>,
    gap: f32,
}

impl PageLayout {
    /// Lay out units of the given sizes with `gap` pixels between them
    pub fn new(sizes: Vec<UnitSize>, gap: f32) -> Self {
        let mut prefix = Vec::with_capacity(sizes.len() + 1);
        let mut total = 0.0;
        prefix.push(total);
        for size in &sizes {
            total += size.height;
            prefix.push(total);
        }
        Self {
            sizes,
            prefix,
            gap: gap.max(0.0),
        }
    }

    /// `count` identical units
    pub fn uniform(count: usize, width: f32, height: f32, gap: f32) -> Self {
        Self::new(vec![UnitSize::new(width, height); count], gap)
    }

    /// A single unit (images, single-page content)
    pub fn single(width: f32, height: f32) -> Self {
        Self::new(vec![UnitSize::new(width, height)], 0.0)
    }

    /// Number of units
    pub fn unit_count(&self) -> usize {
        self.sizes.len()
    }

    /// Whether there are no units
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Size of a unit at 100% zoom
    pub fn unit_size(&self, index: usize) -> Option<UnitSize> {
        self.sizes.get(index).copied()
    }

    /// On-screen top edge of a unit at `zoom`
    pub fn unit_top(&self, index: usize, zoom: ZoomLevel) -> f32 {
        let index = index.min(self.sizes.len());
        self.prefix[index] * zoom.factor() + index as f32 * self.gap
    }

    /// On-screen `[top, bottom)` extent of a unit at `zoom`
    pub fn unit_extent(&self, index: usize, zoom: ZoomLevel) -> (f32, f32) {
        let top = self.unit_top(index, zoom);
        let height = self.sizes.get(index).map_or(0.0, |s| s.height * zoom.factor());
        (top, top + height)
    }

    /// Total scrollable height at `zoom`
    pub fn total_extent(&self, zoom: ZoomLevel) -> f32 {
        match self.sizes.len() {
            0 => 0.0,
            n => self.prefix[n] * zoom.factor() + (n - 1) as f32 * self.gap,
        }
    }

    /// Widest unit at `zoom`
    pub fn max_width(&self, zoom: ZoomLevel) -> f32 {
        self.sizes
            .iter()
            .map(|s| s.width * zoom.factor())
            .fold(0.0, f32::max)
    }

    /// Units whose on-screen extent intersects the viewport
    ///
    /// Units are stacked in order, so the visible set is contiguous.
    pub fn visible_units(&self, viewport: &ViewportState, zoom: ZoomLevel) -> Range<usize> {
        if viewport.visible_extent <= 0.0 {
            return 0..0;
        }
        let n = self.sizes.len();
        let first = partition_point(n, |i| self.unit_extent(i, zoom).1 <= viewport.scroll_offset);
        let end = partition_point(n, |i| self.unit_top(i, zoom) < viewport.bottom());
        first..end.max(first)
    }

    /// Unit whose centre is nearest the viewport centre
    pub fn nearest_unit(&self, viewport: &ViewportState, zoom: ZoomLevel) -> Option<usize> {
        let center = viewport.center();
        (0..self.sizes.len())
            .map(|i| {
                let (top, bottom) = self.unit_extent(i, zoom);
                (i, ((top + bottom) / 2.0 - center).abs())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

/// First index in `0..n` for which `pred` is false, assuming `pred` is
/// true for a prefix and false afterwards
fn partition_point(n: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut low, mut high) = (0, n);
    while low < high {
        let mid = low + (high - low) / 2;
        if pred(mid) {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    low
}

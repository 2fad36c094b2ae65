//! Thumbnail grid over a list of asset files

use super::{display_name, DocumentView, LoadRequest, ViewId, ViewKind, ViewStatus};
use docshell_cache::{BoundedCache, MemoryGovernor, SharedCache};
use docshell_render::{Bitmap, ImageBackend, PageLayout, ViewportState, ZoomLevel};
use docshell_scheduler::{
    Content, Debouncer, Liveness, LivenessToken, LoadResult, SCROLL_IDLE_INTERVAL,
};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Grid geometry and cache size of an asset browser
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetBrowserConfig {
    pub columns: usize,
    /// Height of one grid row
    pub cell_extent: f32,
    /// Longest thumbnail edge in pixels
    pub thumbnail_edge: u32,
    pub cache_entries: usize,
    pub scroll_idle: Duration,
}

impl Default for AssetBrowserConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            cell_extent: 160.0,
            thumbnail_edge: 128,
            cache_entries: 128,
            scroll_idle: SCROLL_IDLE_INTERVAL,
        }
    }
}

impl AssetBrowserConfig {
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns.max(1);
        self
    }

    pub fn with_cell_extent(mut self, extent: f32) -> Self {
        self.cell_extent = extent;
        self
    }

    pub fn with_thumbnail_edge(mut self, edge: u32) -> Self {
        self.thumbnail_edge = edge;
        self
    }

    pub fn with_cache_entries(mut self, entries: usize) -> Self {
        self.cache_entries = entries;
        self
    }

    pub fn with_scroll_idle(mut self, interval: Duration) -> Self {
        self.scroll_idle = interval;
        self
    }
}

/// What one grid cell shows
#[derive(Debug, Clone, PartialEq)]
pub enum CellState {
    /// Not requested yet, or evicted
    Empty,
    /// Load requested, no result yet
    Pending,
    Thumbnail(Rc<Bitmap>),
    Failed(String),
}

/// Asset gallery tab
///
/// Only cells whose row intersects the viewport are loaded. Scrolling is
/// debounced, so a fling requests nothing until it settles.
pub struct AssetBrowser {
    id: ViewId,
    root: PathBuf,
    liveness: Liveness,
    status: ViewStatus,
    assets: Vec<PathBuf>,
    config: AssetBrowserConfig,
    rows: PageLayout,
    viewport: ViewportState,
    scroll: Debouncer<()>,
    backend: ImageBackend,
    thumbnails: SharedCache<PathBuf, Rc<Bitmap>>,
    failures: HashMap<PathBuf, String>,
    requested: HashSet<PathBuf>,
    outbox: Vec<LoadRequest>,
}

impl AssetBrowser {
    /// Create the grid and queue loads for the initially visible cells
    pub fn new(
        id: ViewId,
        root: impl Into<PathBuf>,
        assets: Vec<PathBuf>,
        config: AssetBrowserConfig,
        viewport_extent: f32,
    ) -> Self {
        let columns = config.columns.max(1);
        let row_count = assets.len().div_ceil(columns);
        let mut browser = Self {
            id,
            root: root.into(),
            liveness: Liveness::new(),
            status: ViewStatus::Ready,
            assets,
            config: AssetBrowserConfig { columns, ..config },
            rows: PageLayout::uniform(row_count, 0.0, config.cell_extent, 0.0),
            viewport: ViewportState::new(0.0, viewport_extent),
            scroll: Debouncer::new(config.scroll_idle),
            backend: ImageBackend::new(),
            thumbnails: BoundedCache::shared("thumbnails", config.cache_entries),
            failures: HashMap::new(),
            requested: HashSet::new(),
            outbox: Vec::new(),
        };
        browser.request_visible();
        browser
    }

    pub fn on_scroll(&mut self, now: Instant, scroll_offset: f32) {
        if !self.is_live() {
            return;
        }
        let total = self.rows.total_extent(ZoomLevel::ACTUAL);
        let max = (total - self.viewport.visible_extent).max(0.0);
        self.viewport.scroll_offset = scroll_offset.clamp(0.0, max);
        self.scroll.notify(now, ());
    }

    pub fn on_resize(&mut self, now: Instant, visible_extent: f32) {
        if !self.is_live() {
            return;
        }
        self.viewport.visible_extent = visible_extent.max(0.0);
        self.scroll.notify(now, ());
    }

    /// Indices of assets whose cell intersects the viewport
    pub fn visible_assets(&self) -> Range<usize> {
        let rows = self.rows.visible_units(&self.viewport, ZoomLevel::ACTUAL);
        let columns = self.config.columns;
        let end = (rows.end * columns).min(self.assets.len());
        (rows.start * columns).min(end)..end
    }

    fn request_visible(&mut self) {
        for index in self.visible_assets() {
            let path = &self.assets[index];
            if self.requested.contains(path)
                || self.failures.contains_key(path)
                || self.thumbnails.borrow().contains(path)
            {
                continue;
            }
            self.requested.insert(path.clone());
            self.outbox.push(LoadRequest::read_bytes(path.clone()));
        }
    }

    /// State of the cell showing asset `index`
    pub fn cell(&self, index: usize) -> Option<CellState> {
        let path = self.assets.get(index)?;
        let state = if let Some(thumbnail) = self.thumbnail(path) {
            CellState::Thumbnail(thumbnail)
        } else if let Some(message) = self.failures.get(path) {
            CellState::Failed(message.clone())
        } else if self.requested.contains(path) {
            CellState::Pending
        } else {
            CellState::Empty
        };
        Some(state)
    }

    pub fn thumbnail(&self, path: &Path) -> Option<Rc<Bitmap>> {
        self.thumbnails.borrow().peek(&path.to_path_buf()).cloned()
    }

    pub fn thumbnail_cache(&self) -> &SharedCache<PathBuf, Rc<Bitmap>> {
        &self.thumbnails
    }

    pub fn assets(&self) -> &[PathBuf] {
        &self.assets
    }

    /// Loads requested and not yet answered
    pub fn pending_count(&self) -> usize {
        self.requested.len()
    }
}

impl DocumentView for AssetBrowser {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Assets
    }

    fn target(&self) -> &Path {
        &self.root
    }

    fn title(&self) -> String {
        format!("{} ({} assets)", display_name(&self.root), self.assets.len())
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn apply_result(&mut self, _now: Instant, result: LoadResult) {
        let target = result.target;
        self.requested.remove(&target);

        let thumbnail = match result.outcome {
            Ok(Content::Bytes(bytes)) => self
                .backend
                .thumbnail(&bytes, self.config.thumbnail_edge)
                .map_err(|e| format!("{}: {}", target.display(), e)),
            Ok(other) => {
                log::warn!("asset browser {} ignoring {:?}", self.id, other);
                return;
            }
            Err(error) => Err(error.to_string()),
        };

        match thumbnail {
            Ok(bitmap) => {
                self.thumbnails.borrow_mut().insert(target, Rc::new(bitmap));
            }
            Err(message) => {
                log::debug!("thumbnail failed: {}", message);
                self.failures.insert(target, message);
            }
        }
    }

    fn poll(&mut self, now: Instant) {
        if self.scroll.poll(now).is_some() {
            self.request_visible();
        }
    }

    fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    fn register_caches(&self, governor: &mut MemoryGovernor) {
        let max = self.thumbnails.borrow().max_entries();
        governor.register(&self.thumbnails, max);
    }

    fn liveness_token(&self) -> LivenessToken {
        self.liveness.token()
    }

    fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    fn close(&mut self) {
        self.liveness.revoke();
        self.scroll.cancel();
        self.thumbnails.borrow_mut().clear();
        self.failures.clear();
        self.requested.clear();
        self.outbox.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

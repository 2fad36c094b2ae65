//! Paginated and image views over the page renderer

use super::{display_name, DocumentView, LoadRequest, ViewId, ViewKind, ViewStatus};
use docshell_cache::MemoryGovernor;
use docshell_render::{
    ImageBackend, PageRenderer, PageRendererConfig, RenderBackend, RenderReport, ZoomLevel,
};
use docshell_scheduler::{Content, IoOperation, Liveness, LivenessToken, LoadResult};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Tab showing paginated content through a [`PageRenderer`]
///
/// The backend turns the loaded bytes into a document handle; PDF tabs use
/// a backend supplied by the host, image tabs use [`ImageBackend`].
pub struct PagedView<B: RenderBackend> {
    id: ViewId,
    kind: ViewKind,
    target: PathBuf,
    liveness: Liveness,
    status: ViewStatus,
    renderer: PageRenderer<B>,
    viewport_extent: f32,
    last_report: Option<RenderReport>,
    outbox: Vec<LoadRequest>,
}

/// Image tab: a one-unit paged view
pub type ImageView = PagedView<ImageBackend>;

impl<B: RenderBackend> PagedView<B> {
    /// Create the view and queue the initial read
    pub fn new(
        id: ViewId,
        target: impl Into<PathBuf>,
        backend: B,
        config: PageRendererConfig,
        viewport_extent: f32,
    ) -> Self {
        let target = target.into();
        Self {
            id,
            kind: ViewKind::Paged,
            outbox: vec![LoadRequest::read_bytes(target.clone())],
            target,
            liveness: Liveness::new(),
            status: ViewStatus::Loading,
            renderer: PageRenderer::new(backend, config),
            viewport_extent,
            last_report: None,
        }
    }

    pub fn with_kind(mut self, kind: ViewKind) -> Self {
        self.kind = kind;
        self
    }

    fn is_displaying(&self) -> bool {
        self.liveness.is_live() && self.renderer.has_document()
    }

    pub fn on_scroll(&mut self, now: Instant, scroll_offset: f32) {
        if self.is_displaying() {
            self.renderer.on_scroll(now, scroll_offset);
        }
    }

    /// Resize the viewport; remembered until content loads
    pub fn on_resize(&mut self, now: Instant, visible_extent: f32) {
        self.viewport_extent = visible_extent;
        if self.is_displaying() {
            self.renderer.on_resize(now, visible_extent);
        }
    }

    pub fn jump_to(&mut self, now: Instant, unit_index: usize) {
        if self.is_displaying() {
            self.renderer.jump_to(now, unit_index);
        }
    }

    /// Change zoom and re-render the visible units immediately
    pub fn set_zoom(&mut self, zoom: ZoomLevel) {
        if self.is_displaying() {
            let report = self.renderer.set_zoom(zoom);
            self.record(report);
        }
    }

    pub fn zoom_in(&mut self) {
        if self.is_displaying() {
            let report = self.renderer.zoom_in();
            self.record(report);
        }
    }

    pub fn zoom_out(&mut self) {
        if self.is_displaying() {
            let report = self.renderer.zoom_out();
            self.record(report);
        }
    }

    fn record(&mut self, report: Option<RenderReport>) {
        if report.is_some() {
            self.last_report = report;
        }
    }

    pub fn renderer(&self) -> &PageRenderer<B> {
        &self.renderer
    }

    /// Report of the most recent render pass
    pub fn last_report(&self) -> Option<&RenderReport> {
        self.last_report.as_ref()
    }

    /// Units rendered so far, across all passes
    pub fn decode_calls(&self) -> u64 {
        self.renderer.decode_calls()
    }
}

impl ImageView {
    /// Image tab over [`ImageBackend`]
    pub fn image(
        id: ViewId,
        target: impl Into<PathBuf>,
        config: PageRendererConfig,
        viewport_extent: f32,
    ) -> Self {
        PagedView::new(id, target, ImageBackend::new(), config, viewport_extent)
            .with_kind(ViewKind::Image)
    }
}

impl<B> DocumentView for PagedView<B>
where
    B: RenderBackend + 'static,
    B::Document: 'static,
{
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        self.kind
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn title(&self) -> String {
        let name = display_name(&self.target);
        if self.renderer.unit_count() > 1 {
            format!(
                "{} ({}/{})",
                name,
                self.renderer.current_unit() + 1,
                self.renderer.unit_count()
            )
        } else {
            name
        }
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn apply_result(&mut self, now: Instant, result: LoadResult) {
        match (result.operation, result.outcome) {
            (IoOperation::ReadBytes, Ok(Content::Bytes(bytes))) => {
                match self.renderer.open(&bytes, now) {
                    Ok(()) => {
                        self.renderer.on_resize(now, self.viewport_extent);
                        self.status = ViewStatus::Ready;
                    }
                    Err(error) => {
                        log::warn!("{}: {}", self.target.display(), error);
                        self.status = ViewStatus::Failed(error.to_string());
                    }
                }
            }
            (_, Err(error)) => {
                self.status = ViewStatus::Failed(error.to_string());
            }
            (operation, Ok(_)) => {
                log::warn!("paged view {} ignoring {:?} result", self.id, operation);
            }
        }
    }

    fn poll(&mut self, now: Instant) {
        let report = self.renderer.poll(now);
        self.record(report);
    }

    fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    fn register_caches(&self, governor: &mut MemoryGovernor) {
        let cache = self.renderer.cache();
        let max = cache.borrow().max_entries();
        governor.register(cache, max);
    }

    fn liveness_token(&self) -> LivenessToken {
        self.liveness.token()
    }

    fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    fn close(&mut self) {
        self.liveness.revoke();
        self.renderer.close();
        self.last_report = None;
        self.outbox.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshell_render::{Bitmap, PageLayout, RenderError};
    use docshell_scheduler::IoError;
    use std::time::Duration;

    const IDLE: Duration = Duration::from_millis(200);

    /// Document of `bytes[0]` units, each 80x100
    struct StripBackend;

    impl RenderBackend for StripBackend {
        type Document = usize;

        fn open(&self, bytes: &[u8]) -> Result<(usize, PageLayout), RenderError> {
            let count = *bytes.first().ok_or(RenderError::Empty)? as usize;
            Ok((count, PageLayout::uniform(count, 80.0, 100.0, 0.0)))
        }

        fn render_unit(
            &self,
            count: &usize,
            unit_index: usize,
            _zoom: ZoomLevel,
        ) -> Result<Bitmap, RenderError> {
            if unit_index >= *count {
                return Err(RenderError::UnitOutOfRange {
                    index: unit_index,
                    count: *count,
                });
            }
            Bitmap::from_rgba(1, 1, vec![0; 4], false)
        }
    }

    fn bytes_result(bytes: Vec<u8>) -> LoadResult {
        LoadResult {
            request: 1,
            operation: IoOperation::ReadBytes,
            target: PathBuf::from("doc.pdf"),
            outcome: Ok(Content::Bytes(bytes)),
        }
    }

    fn paged_view(cache_entries: usize) -> PagedView<StripBackend> {
        let config = PageRendererConfig::default().with_cache_entries(cache_entries);
        PagedView::new(5, "doc.pdf", StripBackend, config, 300.0)
    }

    #[test]
    fn test_load_then_idle_render() {
        let start = Instant::now();
        let mut view = paged_view(2);
        assert_eq!(view.take_requests(), vec![LoadRequest::read_bytes("doc.pdf")]);

        view.apply_result(start, bytes_result(vec![10]));
        assert_eq!(view.status(), &ViewStatus::Ready);
        assert_eq!(view.title(), "doc.pdf (1/10)");

        view.on_scroll(start, 300.0);
        view.poll(start + IDLE);

        let report = view.last_report().unwrap();
        assert_eq!(report.visible, 3..6);
        assert_eq!(view.renderer().cache().borrow().len(), 2);
        assert_eq!(view.title(), "doc.pdf (5/10)");
    }

    #[test]
    fn test_scroll_before_load_is_ignored() {
        let start = Instant::now();
        let mut view = paged_view(4);
        view.on_scroll(start, 500.0);
        view.on_resize(start, 200.0);
        view.apply_result(start, bytes_result(vec![10]));
        view.poll(start + IDLE);

        let report = view.last_report().unwrap();
        assert_eq!(report.visible, 0..2);
    }

    #[test]
    fn test_zoom_renders_immediately() {
        let start = Instant::now();
        let mut view = paged_view(8);
        view.apply_result(start, bytes_result(vec![10]));
        view.poll(start + IDLE);
        assert_eq!(view.decode_calls(), 3);

        view.zoom_out();
        assert_eq!(view.renderer().zoom(), ZoomLevel::new(75));
        assert_eq!(view.last_report().unwrap().visible, 0..4);
        assert_eq!(view.decode_calls(), 7);
    }

    #[test]
    fn test_undecodable_content_shows_error() {
        let mut view = paged_view(2);
        view.apply_result(Instant::now(), bytes_result(Vec::new()));
        assert_eq!(
            view.status().error(),
            Some("document has no renderable units")
        );
    }

    #[test]
    fn test_read_failure_shows_error() {
        let mut view = paged_view(2);
        view.apply_result(
            Instant::now(),
            LoadResult {
                request: 1,
                operation: IoOperation::ReadBytes,
                target: PathBuf::from("doc.pdf"),
                outcome: Err(IoError::PermissionDenied {
                    target: PathBuf::from("doc.pdf"),
                }),
            },
        );
        assert_eq!(view.status().error(), Some("doc.pdf: permission denied"));
    }

    #[test]
    fn test_close_releases_render_state() {
        let start = Instant::now();
        let mut view = paged_view(4);
        view.apply_result(start, bytes_result(vec![3]));
        view.poll(start + IDLE);

        view.close();
        view.close();
        assert!(!view.is_live());
        assert!(!view.renderer().has_document());
        assert!(view.renderer().cache().borrow().is_empty());
        assert!(view.last_report().is_none());

        view.set_zoom(ZoomLevel::new(200));
        assert_eq!(view.renderer().zoom(), ZoomLevel::ACTUAL);
    }

    #[test]
    fn test_image_view_renders_single_unit() {
        use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
        use std::io::Cursor;

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 8, Rgb([1, 2, 3])))
            .write_to(&mut png, ImageFormat::Png)
            .unwrap();

        let start = Instant::now();
        let mut view = ImageView::image(9, "photo.png", PageRendererConfig::default(), 600.0);
        assert_eq!(view.kind(), ViewKind::Image);

        view.apply_result(start, bytes_result(png.into_inner()));
        view.poll(start + IDLE);

        let surface = view.renderer().surface(0).unwrap();
        let bitmap = surface.bitmap().unwrap();
        assert_eq!((bitmap.width, bitmap.height), (16, 8));
        assert_eq!(view.title(), "photo.png");
    }
}

//! Interactive-thread event loop
//!
//! The [`Workspace`] owns the I/O worker, the memory governor, the status
//! service and every open view. Hosts call [`Workspace::tick`] from their
//! event loop; each tick
//!
//! 1. drains finished I/O and routes each result to the view that asked for
//!    it, dropping results whose view has been closed,
//! 2. polls every view so debounced and idle-timer work runs,
//! 3. forwards any new requests the views queued to the worker,
//! 4. ticks the memory governor.
//!
//! Views are only touched from this thread. A panic inside a view callback
//! is caught here, logged and posted as a status message; the view stays
//! open and the loop continues.

use crate::config::ShellConfig;
use crate::error::{ViewError, ViewResult};
use crate::status::{StatusMessages, DEFAULT_STATUS_TIMEOUT};
use crate::view::{
    display_name, AssetBrowser, AssetBrowserConfig, DocumentView, ImageView, MarkdownView,
    PagedView, TextView, ViewId, ViewKind,
};
use docshell_cache::MemoryGovernor;
use docshell_render::{PageRendererConfig, RenderBackend};
use docshell_scheduler::{
    IoOperation, IoStats, IoWorker, LivenessToken, LoadResult, RequestId,
};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Viewport height used until the host reports one
pub const DEFAULT_VIEWPORT_EXTENT: f32 = 800.0;

/// Extensions opened in a markdown view
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Extensions opened in an image view
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Which view should answer a request
#[derive(Debug, Clone)]
struct Route {
    view: ViewId,
    token: LivenessToken,
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Results applied to live views
    pub delivered: usize,
    /// Results discarded because their view was closed
    pub stale: usize,
    /// View callbacks that panicked
    pub faults: usize,
}

impl TickReport {
    fn absorb(&mut self, other: TickReport) {
        self.delivered += other.delivered;
        self.stale += other.stale;
        self.faults += other.faults;
    }
}

/// Open views and the services they share
pub struct Workspace {
    config: ShellConfig,
    worker: IoWorker,
    governor: MemoryGovernor,
    status: StatusMessages,
    views: BTreeMap<ViewId, Box<dyn DocumentView>>,
    routes: HashMap<RequestId, Route>,
    /// Views waiting on a read that was merged into one already in flight
    waiting: HashMap<(IoOperation, PathBuf), Vec<Route>>,
    next_view: ViewId,
    viewport_extent: f32,
    shut_down: bool,
}

impl Workspace {
    /// Validate settings, start the worker and the governor
    pub fn new(config: ShellConfig, now: Instant) -> ViewResult<Self> {
        config.validate()?;
        let worker =
            IoWorker::new(config.worker_config()).map_err(|e| ViewError::Spawn(e.to_string()))?;
        let governor = MemoryGovernor::init(config.governor_config(), now);
        Ok(Self::with_services(config, worker, governor))
    }

    /// Assemble a workspace from already started services
    pub fn with_services(config: ShellConfig, worker: IoWorker, governor: MemoryGovernor) -> Self {
        Self {
            config,
            worker,
            governor,
            status: StatusMessages::init(),
            views: BTreeMap::new(),
            routes: HashMap::new(),
            waiting: HashMap::new(),
            next_view: 1,
            viewport_extent: DEFAULT_VIEWPORT_EXTENT,
            shut_down: false,
        }
    }

    /// Viewport height given to views opened from now on
    pub fn set_viewport_extent(&mut self, extent: f32) {
        self.viewport_extent = extent.max(0.0);
    }

    /// Open a host-built view
    ///
    /// Registers its caches with the governor and forwards its initial
    /// requests to the worker.
    pub fn open_view<F>(&mut self, build: F) -> ViewId
    where
        F: FnOnce(ViewId) -> Box<dyn DocumentView>,
    {
        let id = self.next_view;
        self.next_view += 1;

        let view = build(id);
        log::debug!(
            "opening {} view {} for {}",
            view.kind().as_str(),
            id,
            view.target().display()
        );
        view.register_caches(&mut self.governor);
        self.views.insert(id, view);
        self.dispatch(id);
        id
    }

    pub fn open_text(&mut self, path: impl AsRef<Path>) -> ViewId {
        let interval = self.config.debounce_interval();
        let entries = self.config.cache_max_entries.highlight;
        let path = path.as_ref().to_path_buf();
        self.open_view(|id| Box::new(TextView::new(id, path, interval, entries)))
    }

    pub fn open_markdown(&mut self, path: impl AsRef<Path>) -> ViewId {
        let interval = self.config.debounce_interval();
        let entries = self.config.cache_max_entries.preview;
        let path = path.as_ref().to_path_buf();
        self.open_view(|id| Box::new(MarkdownView::new(id, path, interval, entries)))
    }

    /// Open paginated content decoded by `backend`
    pub fn open_paged<B>(&mut self, path: impl AsRef<Path>, backend: B) -> ViewId
    where
        B: RenderBackend + 'static,
        B::Document: 'static,
    {
        let config = self.renderer_config(self.config.cache_max_entries.pages);
        let extent = self.viewport_extent;
        let path = path.as_ref().to_path_buf();
        self.open_view(|id| Box::new(PagedView::new(id, path, backend, config, extent)))
    }

    pub fn open_image(&mut self, path: impl AsRef<Path>) -> ViewId {
        let config = self.renderer_config(self.config.cache_max_entries.images);
        let extent = self.viewport_extent;
        let path = path.as_ref().to_path_buf();
        self.open_view(|id| Box::new(ImageView::image(id, path, config, extent)))
    }

    /// Open a thumbnail grid over `assets`
    pub fn open_assets(&mut self, root: impl AsRef<Path>, assets: Vec<PathBuf>) -> ViewId {
        let config = AssetBrowserConfig::default()
            .with_cache_entries(self.config.cache_max_entries.thumbnails)
            .with_scroll_idle(self.config.scroll_idle());
        let extent = self.viewport_extent;
        let root = root.as_ref().to_path_buf();
        self.open_view(|id| Box::new(AssetBrowser::new(id, root, assets, config, extent)))
    }

    /// Open `path` in the view its extension calls for
    ///
    /// Unknown extensions open as plain text. Paginated formats need a
    /// host backend and go through [`Workspace::open_paged`].
    pub fn open_path(&mut self, path: impl AsRef<Path>) -> ViewResult<ViewId> {
        let path = path.as_ref();
        match view_kind_for(path) {
            ViewKind::Markdown => Ok(self.open_markdown(path)),
            ViewKind::Image => Ok(self.open_image(path)),
            ViewKind::Paged => Err(ViewError::Unsupported {
                path: path.to_path_buf(),
                reason: "no paged render backend is installed".to_string(),
            }),
            _ => Ok(self.open_text(path)),
        }
    }

    fn renderer_config(&self, cache_entries: usize) -> PageRendererConfig {
        PageRendererConfig::default()
            .with_cache_entries(cache_entries)
            .with_idle_interval(self.config.scroll_idle())
            .with_zoom_bounds(self.config.zoom_bounds())
    }

    /// Forward the requests a view has queued
    fn dispatch(&mut self, id: ViewId) {
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        let requests = view.take_requests();
        if requests.is_empty() {
            return;
        }

        let token = view.liveness_token();
        for request in requests {
            let route = Route {
                view: id,
                token: token.clone(),
            };
            let key = (request.operation, request.target.clone());
            match self
                .worker
                .enqueue(request.operation, request.target, request.payload)
            {
                Some(request_id) => {
                    self.routes.insert(request_id, route);
                }
                None if self.worker.is_stopped() => {}
                None => self.waiting.entry(key).or_default().push(route),
            }
        }
    }

    /// Run one iteration of the event loop without blocking
    pub fn tick(&mut self, now: Instant) -> TickReport {
        if self.shut_down {
            return TickReport::default();
        }
        let results = self.worker.drain();
        self.process(now, results)
    }

    /// Wait up to `timeout` for I/O, then run one iteration
    ///
    /// For headless drivers; interactive hosts call [`Workspace::tick`].
    pub fn pump(&mut self, timeout: Duration) -> TickReport {
        if self.shut_down {
            return TickReport::default();
        }
        let results = self.worker.drain_blocking(timeout);
        self.process(Instant::now(), results)
    }

    /// Pump until no live view waits on I/O or `timeout` passes
    pub fn run_until_idle(&mut self, timeout: Duration) -> TickReport {
        let deadline = Instant::now() + timeout;
        let mut total = TickReport::default();
        loop {
            let now = Instant::now();
            if self.pending_loads() == 0 || now >= deadline || self.shut_down {
                return total;
            }
            total.absorb(self.pump(deadline - now));
        }
    }

    fn process(&mut self, now: Instant, results: Vec<LoadResult>) -> TickReport {
        let mut report = TickReport::default();
        for result in results {
            self.deliver(now, result, &mut report);
        }

        let ids: Vec<ViewId> = self.views.keys().copied().collect();
        for id in ids {
            self.guarded(now, id, &mut report, |view, now| view.poll(now));
            self.dispatch(id);
        }

        self.governor.tick(now);
        report
    }

    fn deliver(&mut self, now: Instant, result: LoadResult, report: &mut TickReport) {
        let mut recipients: Vec<Route> = self.routes.remove(&result.request).into_iter().collect();
        if let Some(merged) = self
            .waiting
            .remove(&(result.operation, result.target.clone()))
        {
            recipients.extend(merged);
        }

        for route in recipients {
            if !route.token.is_live() || !self.views.contains_key(&route.view) {
                log::debug!(
                    "discarding result for {}: view {} is closed",
                    result.target.display(),
                    route.view
                );
                report.stale += 1;
                continue;
            }

            self.announce(now, &result);
            let delivered = result.clone();
            self.guarded(now, route.view, report, move |view, now| {
                view.apply_result(now, delivered)
            });
            self.dispatch(route.view);
            report.delivered += 1;
        }
    }

    /// Post status messages for saves and failures
    fn announce(&mut self, now: Instant, result: &LoadResult) {
        match (&result.operation, &result.outcome) {
            (IoOperation::Write, Ok(_)) => self.status.post(
                now,
                format!("Saved {}", display_name(&result.target)),
                Some(DEFAULT_STATUS_TIMEOUT),
            ),
            (_, Err(error)) => {
                log::warn!("{}", error);
                self.status
                    .post(now, error.to_string(), Some(DEFAULT_STATUS_TIMEOUT));
            }
            _ => {}
        }
    }

    /// Run a view callback, containing any panic it raises
    fn guarded<F>(&mut self, now: Instant, id: ViewId, report: &mut TickReport, callback: F)
    where
        F: FnOnce(&mut (dyn DocumentView + 'static), Instant),
    {
        let Some(view) = self.views.get_mut(&id) else {
            return;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(view.as_mut(), now)));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            let name = display_name(view.target());
            log::error!("view {} ({}) faulted: {}", id, name, message);
            self.status.post(
                now,
                format!("{}: internal error: {}", name, message),
                Some(DEFAULT_STATUS_TIMEOUT),
            );
            report.faults += 1;
        }
    }

    /// Close a view; results still in flight for it become stale
    pub fn close_view(&mut self, id: ViewId) -> ViewResult<()> {
        let mut view = self.views.remove(&id).ok_or(ViewError::UnknownView(id))?;
        close_contained(id, view.as_mut());
        Ok(())
    }

    /// Close every view and stop the services
    ///
    /// Returns whether the worker thread was joined in time. Idempotent.
    pub fn shutdown(&mut self) -> bool {
        if self.shut_down {
            return true;
        }
        self.shut_down = true;

        for (id, mut view) in std::mem::take(&mut self.views) {
            close_contained(id, view.as_mut());
        }
        self.routes.clear();
        self.waiting.clear();
        self.governor.shutdown();
        self.status.shutdown();

        let joined = self.worker.shutdown();
        log::info!("workspace shut down (worker joined: {})", joined);
        joined
    }

    pub fn view(&self, id: ViewId) -> Option<&dyn DocumentView> {
        self.views.get(&id).map(|view| view.as_ref())
    }

    /// Concrete view, if `id` is open and of type `T`
    pub fn view_as<T: DocumentView>(&self, id: ViewId) -> Option<&T> {
        self.views.get(&id)?.as_any().downcast_ref::<T>()
    }

    pub fn view_as_mut<T: DocumentView>(&mut self, id: ViewId) -> Option<&mut T> {
        self.views.get_mut(&id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Ids of open views in opening order
    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views.keys().copied().collect()
    }

    /// Requests whose live view is still waiting for a result
    pub fn pending_loads(&self) -> usize {
        let routed = self.routes.values().filter(|r| r.token.is_live()).count();
        let merged = self
            .waiting
            .values()
            .flatten()
            .filter(|r| r.token.is_live())
            .count();
        routed + merged
    }

    pub fn status(&self) -> &StatusMessages {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusMessages {
        &mut self.status
    }

    pub fn governor(&self) -> &MemoryGovernor {
        &self.governor
    }

    pub fn governor_mut(&mut self) -> &mut MemoryGovernor {
        &mut self.governor
    }

    pub fn worker_stats(&self) -> IoStats {
        self.worker.stats()
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// View kind chosen for `path` by its extension
pub fn view_kind_for(path: &Path) -> ViewKind {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if MARKDOWN_EXTENSIONS.contains(&extension.as_str()) {
        ViewKind::Markdown
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        ViewKind::Image
    } else if extension == "pdf" {
        ViewKind::Paged
    } else {
        ViewKind::Text
    }
}

fn close_contained(id: ViewId, view: &mut dyn DocumentView) {
    if panic::catch_unwind(AssertUnwindSafe(|| view.close())).is_err() {
        log::error!("view {} panicked while closing", id);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{LoadRequest, ViewStatus};
    use docshell_cache::GovernorConfig;
    use docshell_scheduler::{Content, IoError, IoWorkerConfig, Liveness, WorkItem};
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    fn echo_workspace() -> Workspace {
        echo_workspace_with(IoWorkerConfig::default())
    }

    fn dedupe_workspace() -> Workspace {
        echo_workspace_with(IoWorkerConfig::default().with_dedupe_in_flight(true))
    }

    /// Worker answering every read with the file name as text
    fn echo_workspace_with(worker_config: IoWorkerConfig) -> Workspace {
        let executor = Arc::new(|item: &WorkItem| match item.operation {
            IoOperation::Write => Ok(Content::Written {
                bytes: item.payload.len(),
            }),
            _ if item.target.ends_with("missing.txt") => Err(IoError::NotFound {
                target: item.target.clone(),
            }),
            _ => Ok(Content::Text(display_name(&item.target))),
        });
        let worker = IoWorker::with_executor(worker_config, executor).unwrap();
        let governor = MemoryGovernor::init(GovernorConfig::default(), Instant::now());
        Workspace::with_services(ShellConfig::default(), worker, governor)
    }

    /// View that panics when polled
    struct Faulty {
        liveness: Liveness,
        target: PathBuf,
        status: ViewStatus,
    }

    impl DocumentView for Faulty {
        fn id(&self) -> ViewId {
            0
        }
        fn kind(&self) -> ViewKind {
            ViewKind::Text
        }
        fn target(&self) -> &Path {
            &self.target
        }
        fn title(&self) -> String {
            "faulty".to_string()
        }
        fn status(&self) -> &ViewStatus {
            &self.status
        }
        fn apply_result(&mut self, _now: Instant, _result: LoadResult) {}
        fn poll(&mut self, _now: Instant) {
            panic!("poll exploded");
        }
        fn take_requests(&mut self) -> Vec<LoadRequest> {
            Vec::new()
        }
        fn register_caches(&self, _governor: &mut MemoryGovernor) {}
        fn liveness_token(&self) -> LivenessToken {
            self.liveness.token()
        }
        fn is_live(&self) -> bool {
            self.liveness.is_live()
        }
        fn close(&mut self) {
            self.liveness.revoke();
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_view_kind_by_extension() {
        assert_eq!(view_kind_for(Path::new("a.md")), ViewKind::Markdown);
        assert_eq!(view_kind_for(Path::new("b.PNG")), ViewKind::Image);
        assert_eq!(view_kind_for(Path::new("c.pdf")), ViewKind::Paged);
        assert_eq!(view_kind_for(Path::new("Makefile")), ViewKind::Text);
    }

    #[test]
    fn test_open_routes_result_to_view() {
        let mut workspace = echo_workspace();
        let id = workspace.open_text("/docs/a.txt");
        assert_eq!(workspace.pending_loads(), 1);

        let report = workspace.run_until_idle(WAIT);
        assert_eq!(report.delivered, 1);

        let view = workspace.view_as::<TextView>(id).unwrap();
        assert_eq!(view.text(), "a.txt");
        assert_eq!(view.status(), &ViewStatus::Ready);
        assert_eq!(workspace.pending_loads(), 0);
    }

    #[test]
    fn test_failure_posts_status_and_inline_error() {
        let mut workspace = echo_workspace();
        let id = workspace.open_text("/docs/missing.txt");
        workspace.run_until_idle(WAIT);

        let view = workspace.view(id).unwrap();
        assert_eq!(view.status().error(), Some("/docs/missing.txt: file not found"));
        assert_eq!(
            workspace.status().current(Instant::now()),
            Some("/docs/missing.txt: file not found")
        );
    }

    #[test]
    fn test_result_after_close_is_discarded() {
        let mut workspace = echo_workspace();
        let id = workspace.open_text("/docs/a.txt");
        workspace.close_view(id).unwrap();

        assert_eq!(workspace.pending_loads(), 0);
        let mut report = TickReport::default();
        let deadline = Instant::now() + WAIT;
        while report.stale == 0 && Instant::now() < deadline {
            report.absorb(workspace.pump(Duration::from_millis(50)));
        }
        assert_eq!(report.stale, 1);
        assert_eq!(report.delivered, 0);
        assert!(workspace.view(id).is_none());
    }

    #[test]
    fn test_merged_read_reaches_every_view() {
        let mut workspace = dedupe_workspace();
        let first = workspace.open_text("/docs/shared.txt");
        let second = workspace.open_text("/docs/shared.txt");
        assert_eq!(workspace.pending_loads(), 2);

        let report = workspace.run_until_idle(WAIT);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.stale, 0);

        for id in [first, second] {
            let view = workspace.view_as::<TextView>(id).unwrap();
            assert_eq!(view.text(), "shared.txt");
            assert_eq!(view.status(), &ViewStatus::Ready);
        }
        let stats = workspace.worker_stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.suppressed, 1);
        assert_eq!(workspace.pending_loads(), 0);
    }

    #[test]
    fn test_merged_read_for_closed_view_is_stale() {
        let mut workspace = dedupe_workspace();
        let first = workspace.open_text("/docs/shared.txt");
        let second = workspace.open_text("/docs/shared.txt");
        workspace.close_view(second).unwrap();
        assert_eq!(workspace.pending_loads(), 1);

        let report = workspace.run_until_idle(WAIT);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(workspace.view_as::<TextView>(first).unwrap().text(), "shared.txt");
        assert!(workspace.view(second).is_none());
    }

    #[test]
    fn test_merged_read_survives_closing_the_requester() {
        let mut workspace = dedupe_workspace();
        let first = workspace.open_text("/docs/shared.txt");
        let second = workspace.open_text("/docs/shared.txt");
        workspace.close_view(first).unwrap();

        let report = workspace.run_until_idle(WAIT);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(workspace.view_as::<TextView>(second).unwrap().text(), "shared.txt");
    }

    #[test]
    fn test_close_unknown_view() {
        let mut workspace = echo_workspace();
        assert_eq!(workspace.close_view(42), Err(ViewError::UnknownView(42)));
    }

    #[test]
    fn test_panicking_view_is_contained() {
        let mut workspace = echo_workspace();
        let faulty = workspace.open_view(|_| {
            Box::new(Faulty {
                liveness: Liveness::new(),
                target: PathBuf::from("boom.txt"),
                status: ViewStatus::Ready,
            })
        });
        let text = workspace.open_text("/docs/a.txt");

        let report = workspace.run_until_idle(WAIT);
        assert!(report.faults >= 1);
        assert!(workspace.view(faulty).is_some());
        assert_eq!(workspace.view_as::<TextView>(text).unwrap().text(), "a.txt");
    }

    #[test]
    fn test_save_goes_through_worker() {
        let mut workspace = echo_workspace();
        let id = workspace.open_text("/docs/a.txt");
        workspace.run_until_idle(WAIT);

        let view = workspace.view_as_mut::<TextView>(id).unwrap();
        view.edit(Instant::now(), "changed");
        assert!(view.save());

        workspace.tick(Instant::now());
        assert_eq!(workspace.pending_loads(), 1);
        workspace.run_until_idle(WAIT);

        assert!(!workspace.view_as::<TextView>(id).unwrap().is_modified());
        assert_eq!(workspace.status().current(Instant::now()), Some("Saved a.txt"));
    }

    #[test]
    fn test_open_path_rejects_paged_without_backend() {
        let mut workspace = echo_workspace();
        assert!(matches!(
            workspace.open_path("report.pdf"),
            Err(ViewError::Unsupported { .. })
        ));
        assert!(workspace.view_ids().is_empty());
    }

    #[test]
    fn test_views_register_caches_with_governor() {
        let mut workspace = echo_workspace();
        workspace.open_text("a.txt");
        workspace.open_markdown("b.md");
        workspace.open_image("c.png");
        assert_eq!(workspace.governor().registered_count(), 3);

        let first = workspace.view_ids()[0];
        workspace.close_view(first).unwrap();
        assert_eq!(workspace.governor().registered_count(), 2);
    }

    #[test]
    fn test_shutdown_is_idempotent_and_closes_views() {
        let mut workspace = echo_workspace();
        workspace.open_text("a.txt");
        workspace.run_until_idle(WAIT);

        assert!(workspace.shutdown());
        assert!(workspace.shutdown());
        assert!(workspace.view_ids().is_empty());
        assert!(!workspace.governor().is_running());
        assert_eq!(workspace.tick(Instant::now()), TickReport::default());
    }
}

//! Markdown view with a debounced preview

use super::{DocumentView, EditBuffer, LoadRequest, ViewId, ViewKind, ViewStatus};
use crate::markdown::{MarkdownRenderer, PulldownRenderer};
use docshell_cache::{BoundedCache, MemoryGovernor, SharedCache};
use docshell_scheduler::{Content, IoOperation, Liveness, LivenessToken, LoadResult};
use std::any::Any;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Markdown tab: editable source plus an HTML preview
///
/// The preview re-renders once per quiet period after edits. Rendered HTML
/// is cached per exact source text.
pub struct MarkdownView {
    id: ViewId,
    liveness: Liveness,
    status: ViewStatus,
    buffer: EditBuffer,
    renderer: Box<dyn MarkdownRenderer>,
    previews: SharedCache<String, Rc<str>>,
    preview: Option<Rc<str>>,
    render_runs: u64,
    save_error: Option<String>,
    outbox: Vec<LoadRequest>,
}

impl MarkdownView {
    /// Create the view and queue the initial read
    pub fn new(
        id: ViewId,
        target: impl AsRef<Path>,
        debounce_interval: Duration,
        cache_entries: usize,
    ) -> Self {
        let target = target.as_ref();
        Self {
            id,
            liveness: Liveness::new(),
            status: ViewStatus::Loading,
            buffer: EditBuffer::new(target, debounce_interval),
            renderer: Box::new(PulldownRenderer),
            previews: BoundedCache::shared("preview", cache_entries),
            preview: None,
            render_runs: 0,
            save_error: None,
            outbox: vec![LoadRequest::read_text(target)],
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the source; the preview follows after the quiet interval
    pub fn edit(&mut self, now: Instant, text: impl Into<String>) {
        if !self.is_live() {
            return;
        }
        self.buffer.edit(now, text);
    }

    /// Queue a write of the current source
    pub fn save(&mut self) -> bool {
        if !self.is_live() || self.status != ViewStatus::Ready {
            return false;
        }
        let request = self.buffer.begin_save();
        self.outbox.push(request);
        true
    }

    fn refresh_preview(&mut self) {
        let source = self.buffer.text().to_string();
        let cached = self.previews.borrow_mut().get(&source).cloned();
        let html = match cached {
            Some(html) => html,
            None => {
                let html: Rc<str> = Rc::from(self.renderer.render(&source));
                self.render_runs += 1;
                self.previews.borrow_mut().insert(source, html.clone());
                html
            }
        };
        self.preview = Some(html);
    }

    pub fn source(&self) -> &str {
        self.buffer.text()
    }

    /// HTML of the last rendered source
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    /// Number of times the renderer actually ran
    pub fn render_runs(&self) -> u64 {
        self.render_runs
    }

    pub fn preview_cache(&self) -> &SharedCache<String, Rc<str>> {
        &self.previews
    }

    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }
}

impl DocumentView for MarkdownView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Markdown
    }

    fn target(&self) -> &Path {
        self.buffer.target()
    }

    fn title(&self) -> String {
        self.buffer.title().to_string()
    }

    fn status(&self) -> &ViewStatus {
        &self.status
    }

    fn apply_result(&mut self, _now: Instant, result: LoadResult) {
        match (result.operation, result.outcome) {
            (IoOperation::ReadText, Ok(Content::Text(text))) => {
                self.buffer.load(text);
                self.status = ViewStatus::Ready;
                self.refresh_preview();
            }
            (IoOperation::Write, outcome) => {
                self.buffer.finish_save(outcome.is_ok());
                self.save_error = outcome.err().map(|e| e.to_string());
            }
            (_, Err(error)) => {
                self.preview = None;
                self.status = ViewStatus::Failed(error.to_string());
            }
            (operation, Ok(_)) => {
                log::warn!("markdown view {} ignoring {:?} result", self.id, operation);
            }
        }
    }

    fn poll(&mut self, now: Instant) {
        if self.buffer.poll(now) {
            self.refresh_preview();
        }
    }

    fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    fn register_caches(&self, governor: &mut MemoryGovernor) {
        let max = self.previews.borrow().max_entries();
        governor.register(&self.previews, max);
    }

    fn liveness_token(&self) -> LivenessToken {
        self.liveness.token()
    }

    fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    fn close(&mut self) {
        self.liveness.revoke();
        self.buffer.close();
        self.previews.borrow_mut().clear();
        self.preview = None;
        self.outbox.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

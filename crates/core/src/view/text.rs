//! Plain-text editor view

use super::{DocumentView, EditBuffer, LoadRequest, ViewId, ViewKind, ViewStatus};
use crate::highlight::{HighlightedText, Highlighter, PlainHighlighter};
use docshell_cache::{BoundedCache, MemoryGovernor, SharedCache};
use docshell_scheduler::{Content, IoOperation, Liveness, LivenessToken, LoadResult};
use std::any::Any;
use std::path::Path;
use std::time::{Duration, Instant};

/// Editor tab with debounced title and highlight refresh
///
/// Highlight spans are cached per exact text, so returning to an earlier
/// text reuses its spans without running the highlighter.
pub struct TextView {
    id: ViewId,
    liveness: Liveness,
    status: ViewStatus,
    buffer: EditBuffer,
    highlighter: Box<dyn Highlighter>,
    highlights: SharedCache<String, HighlightedText>,
    current: Option<HighlightedText>,
    highlight_runs: u64,
    save_error: Option<String>,
    outbox: Vec<LoadRequest>,
}

impl TextView {
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
            highlighter: Box::new(PlainHighlighter),
            highlights: BoundedCache::shared("highlight", cache_entries),
            current: None,
            highlight_runs: 0,
            save_error: None,
            outbox: vec![LoadRequest::read_text(target)],
        }
    }

    pub fn with_highlighter(mut self, highlighter: Box<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    /// Replace the text; highlighting and the title follow after the quiet interval
    pub fn edit(&mut self, now: Instant, text: impl Into<String>) {
        if !self.is_live() {
            return;
        }
        self.buffer.edit(now, text);
    }

    /// Queue a write of the current text
    pub fn save(&mut self) -> bool {
        if !self.is_live() || self.status != ViewStatus::Ready {
            return false;
        }
        let request = self.buffer.begin_save();
        self.outbox.push(request);
        true
    }

    /// Queue a fresh read of the target
    pub fn reload(&mut self) {
        if !self.is_live() {
            return;
        }
        self.status = ViewStatus::Loading;
        self.outbox.push(LoadRequest::read_text(self.buffer.target()));
    }

    fn refresh_highlights(&mut self) {
        let text = self.buffer.text();
        let cached = self.highlights.borrow_mut().get(&text.to_string()).cloned();
        let spans = match cached {
            Some(spans) => spans,
            None => {
                let spans = self.highlighter.highlight(text);
                self.highlight_runs += 1;
                self.highlights
                    .borrow_mut()
                    .insert(text.to_string(), spans.clone());
                spans
            }
        };
        self.current = Some(spans);
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    /// Spans of the last refreshed text
    pub fn highlights(&self) -> Option<&HighlightedText> {
        self.current.as_ref()
    }

    /// Number of times the highlighter actually ran
    pub fn highlight_runs(&self) -> u64 {
        self.highlight_runs
    }

    pub fn highlight_cache(&self) -> &SharedCache<String, HighlightedText> {
        &self.highlights
    }

    /// Cause of the last failed save
    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }
}

impl DocumentView for TextView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn kind(&self) -> ViewKind {
        ViewKind::Text
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
                self.refresh_highlights();
            }
            (IoOperation::Write, Ok(_)) => {
                self.buffer.finish_save(true);
                self.save_error = None;
            }
            (IoOperation::Write, Err(error)) => {
                self.buffer.finish_save(false);
                self.save_error = Some(error.to_string());
            }
            (_, Err(error)) => {
                self.current = None;
                self.status = ViewStatus::Failed(error.to_string());
            }
            (operation, Ok(_)) => {
                log::warn!("text view {} ignoring {:?} result", self.id, operation);
            }
        }
    }

    fn poll(&mut self, now: Instant) {
        if self.buffer.poll(now) {
            self.refresh_highlights();
        }
    }

    fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    fn register_caches(&self, governor: &mut MemoryGovernor) {
        let max = self.highlights.borrow().max_entries();
        governor.register(&self.highlights, max);
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
        self.highlights.borrow_mut().clear();
        self.current = None;
        self.outbox.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

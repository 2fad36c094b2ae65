//! Document views
//!
//! Every tab kind implements [`DocumentView`]. Views never talk to the
//! worker directly: they queue [`LoadRequest`]s that the workspace drains,
//! enqueues and later answers with `apply_result`. Each view owns a
//! [`Liveness`](docshell_scheduler::Liveness) that `close` revokes, so
//! results arriving after close are dropped before they reach the view.

mod assets;
mod buffer;
mod markdown;
mod paged;
mod text;

pub use assets::{AssetBrowser, AssetBrowserConfig, CellState};
pub use buffer::EditBuffer;
pub use markdown::MarkdownView;
pub use paged::{ImageView, PagedView};
pub use text::TextView;

use docshell_cache::MemoryGovernor;
use docshell_scheduler::{IoOperation, LivenessToken, LoadResult};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Identifier of an open view
pub type ViewId = u64;

/// Kind of document a view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Text,
    Markdown,
    Paged,
    Image,
    Assets,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Text => "text",
            ViewKind::Markdown => "markdown",
            ViewKind::Paged => "paged",
            ViewKind::Image => "image",
            ViewKind::Assets => "assets",
        }
    }
}

/// Load state shown by a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    /// Waiting for content
    Loading,
    /// Content is displayed
    Ready,
    /// Inline error shown in place of content
    Failed(String),
}

impl ViewStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewStatus::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewStatus::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// I/O a view wants performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub operation: IoOperation,
    pub target: PathBuf,
    pub payload: Vec<u8>,
}

impl LoadRequest {
    pub fn read_text(target: impl Into<PathBuf>) -> Self {
        Self::new(IoOperation::ReadText, target, Vec::new())
    }

    pub fn read_bytes(target: impl Into<PathBuf>) -> Self {
        Self::new(IoOperation::ReadBytes, target, Vec::new())
    }

    pub fn write(target: impl Into<PathBuf>, payload: Vec<u8>) -> Self {
        Self::new(IoOperation::Write, target, payload)
    }

    fn new(operation: IoOperation, target: impl Into<PathBuf>, payload: Vec<u8>) -> Self {
        Self {
            operation,
            target: target.into(),
            payload,
        }
    }
}

/// A tab in the workspace
pub trait DocumentView: Any {
    fn id(&self) -> ViewId;

    fn kind(&self) -> ViewKind;

    /// Path the view was opened for
    fn target(&self) -> &Path;

    /// Tab title
    fn title(&self) -> String;

    fn status(&self) -> &ViewStatus;

    /// Apply a delivered result
    ///
    /// Only called while the view is live.
    fn apply_result(&mut self, now: Instant, result: LoadResult);

    /// Advance the view's timers
    fn poll(&mut self, now: Instant);

    /// Requests queued since the last call
    fn take_requests(&mut self) -> Vec<LoadRequest>;

    /// Register every bounded cache the view owns
    fn register_caches(&self, governor: &mut MemoryGovernor);

    /// Token attached to each request this view issues
    fn liveness_token(&self) -> LivenessToken;

    fn is_live(&self) -> bool;

    /// Stop timers, clear caches and release every artifact
    ///
    /// Idempotent and safe on a view whose content never loaded.
    fn close(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// File name of `path`, or the whole path if it has none
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

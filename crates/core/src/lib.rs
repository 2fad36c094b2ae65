//! Docshell Core Library
//!
//! Document views and the interactive-thread workspace that drives them.
//!
//! A [`Workspace`] opens views, forwards their load requests to the
//! background worker, routes results back to live views, polls debounce and
//! idle timers, and ticks the memory governor. Everything here runs on one
//! thread; only file I/O happens elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use docshell_core::{ShellConfig, TextView, Workspace};
//! use std::time::{Duration, Instant};
//!
//! let mut workspace = Workspace::new(ShellConfig::default(), Instant::now()).unwrap();
//! let id = workspace.open_text("/tmp/notes.txt");
//! workspace.run_until_idle(Duration::from_secs(1));
//!
//! if let Some(view) = workspace.view_as::<TextView>(id) {
//!     println!("{}", view.text());
//! }
//! workspace.shutdown();
//! ```

pub mod config;
pub mod error;
pub mod highlight;
pub mod markdown;
pub mod status;
pub mod view;
pub mod workspace;

pub use config::{CacheLimits, ShellConfig};
pub use error::{ConfigError, ViewError, ViewResult};
pub use highlight::{HighlightedText, Highlighter, PlainHighlighter, Span, SpanKind};
pub use markdown::{MarkdownRenderer, PulldownRenderer};
pub use status::{StatusMessage, StatusMessages, DEFAULT_STATUS_TIMEOUT};
pub use view::{
    AssetBrowser, AssetBrowserConfig, CellState, DocumentView, EditBuffer, ImageView,
    LoadRequest, MarkdownView, PagedView, TextView, ViewId, ViewKind, ViewStatus,
};
pub use workspace::{view_kind_for, TickReport, Workspace, DEFAULT_VIEWPORT_EXTENT};

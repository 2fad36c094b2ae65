//! Editable text shared by the editor and markdown views

use super::{display_name, LoadRequest};
use docshell_scheduler::Debouncer;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Text content with a modified flag and a debounced tab title
///
/// Edits mark the buffer modified at once, but the title only picks up
/// the `*` marker when the edit debouncer fires.
#[derive(Debug)]
pub struct EditBuffer {
    target: PathBuf,
    text: String,
    modified: bool,
    revision: u64,
    saving_revision: Option<u64>,
    title: String,
    edits: Debouncer<u64>,
}

impl EditBuffer {
    pub fn new(target: impl Into<PathBuf>, debounce_interval: Duration) -> Self {
        let target = target.into();
        let title = display_name(&target);
        Self {
            target,
            text: String::new(),
            modified: false,
            revision: 0,
            saving_revision: None,
            title,
            edits: Debouncer::new(debounce_interval),
        }
    }

    /// Replace the content with freshly loaded text
    pub fn load(&mut self, text: String) {
        self.text = text;
        self.modified = false;
        self.revision += 1;
        self.edits.cancel();
        self.refresh_title();
    }

    /// Record an edit; derived state refreshes after the quiet interval
    pub fn edit(&mut self, now: Instant, text: impl Into<String>) {
        self.text = text.into();
        self.modified = true;
        self.revision += 1;
        self.edits.notify(now, self.revision);
    }

    /// Whether the edit debouncer fired at `now`
    ///
    /// Refreshes the title when it does.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.edits.poll(now).is_none() {
            return false;
        }
        self.refresh_title();
        true
    }

    /// Write request for the current text
    pub fn begin_save(&mut self) -> LoadRequest {
        self.saving_revision = Some(self.revision);
        LoadRequest::write(self.target.clone(), self.text.as_bytes().to_vec())
    }

    /// Settle a save; the buffer stays modified if it changed meanwhile
    pub fn finish_save(&mut self, success: bool) {
        if success && self.saving_revision == Some(self.revision) {
            self.modified = false;
        }
        self.saving_revision = None;
        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        let name = display_name(&self.target);
        self.title = if self.modified {
            format!("{}*", name)
        } else {
            name
        };
    }

    /// Drop the content and any pending refresh
    pub fn close(&mut self) {
        self.edits.cancel();
        self.text = String::new();
        self.saving_revision = None;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether a debounced refresh is pending
    pub fn is_refresh_pending(&self) -> bool {
        self.edits.is_pending()
    }

    /// Number of debounced refreshes so far
    pub fn refresh_count(&self) -> u64 {
        self.edits.fire_count()
    }
}

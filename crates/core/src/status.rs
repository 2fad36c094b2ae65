//! Status-line messages
//!
//! A process-scoped service with an explicit `init`/`shutdown` lifecycle.
//! Components receive it by reference; there is no global instance.

use std::time::{Duration, Instant};

/// Default display time of a status message
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// A posted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub posted_at: Instant,
    /// `None` keeps the message until it is replaced
    pub expires_at: Option<Instant>,
}

impl StatusMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// Status-line service
#[derive(Debug)]
pub struct StatusMessages {
    current: Option<StatusMessage>,
    posted: u64,
    running: bool,
}

impl StatusMessages {
    /// Start the service with an empty status line
    pub fn init() -> Self {
        Self {
            current: None,
            posted: 0,
            running: true,
        }
    }

    /// Post a message, replacing the current one
    ///
    /// Ignored after `shutdown`.
    pub fn post(&mut self, now: Instant, text: impl Into<String>, timeout: Option<Duration>) {
        if !self.running {
            return;
        }
        let text = text.into();
        log::info!("status: {}", text);
        self.current = Some(StatusMessage {
            text,
            posted_at: now,
            expires_at: timeout.map(|t| now + t),
        });
        self.posted += 1;
    }

    /// Text shown at `now`, if any
    pub fn current(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|message| message.is_visible(now))
            .map(|message| message.text.as_str())
    }

    /// Remove the current message
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Number of messages posted since `init`
    pub fn posted_count(&self) -> u64 {
        self.posted
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop accepting messages and clear the status line
    pub fn shutdown(&mut self) {
        self.running = false;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_expires_after_timeout() {
        let start = Instant::now();
        let mut status = StatusMessages::init();
        status.post(start, "saved a.txt", Some(Duration::from_secs(2)));

        assert_eq!(status.current(start), Some("saved a.txt"));
        assert_eq!(status.current(start + Duration::from_millis(1999)), Some("saved a.txt"));
        assert_eq!(status.current(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn test_newer_message_replaces_older() {
        let start = Instant::now();
        let mut status = StatusMessages::init();
        status.post(start, "first", None);
        status.post(start, "second", None);

        assert_eq!(status.current(start + Duration::from_secs(3600)), Some("second"));
        assert_eq!(status.posted_count(), 2);
    }

    #[test]
    fn test_shutdown_ignores_posts() {
        let start = Instant::now();
        let mut status = StatusMessages::init();
        status.post(start, "hello", None);
        status.shutdown();
        status.post(start, "late", None);

        assert!(!status.is_running());
        assert_eq!(status.current(start), None);
        assert_eq!(status.posted_count(), 1);
    }
}

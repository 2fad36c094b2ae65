//! Trailing-edge debouncing of high-frequency event streams
//!
//! Keystrokes, scroll deltas and resize events arrive far faster than the
//! work they trigger can be redone. A [`Debouncer`] remembers the latest
//! state handed to [`Debouncer::notify`] and releases it once no further
//! notification has arrived for a full quiet interval.

use crate::timer::SingleShotTimer;
use std::time::{Duration, Instant};

/// Default quiet interval for text changes
pub const TEXT_CHANGE_INTERVAL: Duration = Duration::from_millis(300);

/// Default quiet interval for scroll settling
pub const SCROLL_IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Coalesces bursts of notifications into one trailing firing
///
/// # Example
///
/// ```
/// use docshell_scheduler::Debouncer;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut debouncer = Debouncer::new(Duration::from_millis(300));
///
/// debouncer.notify(start, "h");
/// debouncer.notify(start + Duration::from_millis(100), "he");
/// debouncer.notify(start + Duration::from_millis(200), "hey");
///
/// assert_eq!(debouncer.poll(start + Duration::from_millis(400)), None);
/// assert_eq!(debouncer.poll(start + Duration::from_millis(500)), Some("hey"));
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    timer: SingleShotTimer,
    pending: Option<T>,
    fired: u64,
}

impl<T> Debouncer<T> {
    /// Create an idle debouncer with the given quiet interval
    pub fn new(interval: Duration) -> Self {
        Self {
            timer: SingleShotTimer::new(interval),
            pending: None,
            fired: 0,
        }
    }

    /// Quiet interval
    pub fn interval(&self) -> Duration {
        self.timer.interval()
    }

    /// Record an event and (re)arm the quiet-period countdown
    ///
    /// The state replaces whatever was pending.
    pub fn notify(&mut self, now: Instant, state: T) {
        self.pending = Some(state);
        self.timer.arm(now);
    }

    /// Release the pending state if the quiet interval has elapsed
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if !self.timer.poll(now) {
            return None;
        }
        let state = self.pending.take();
        if state.is_some() {
            self.fired += 1;
        }
        state
    }

    /// Release the pending state immediately, bypassing the countdown
    pub fn flush(&mut self) -> Option<T> {
        self.timer.cancel();
        let state = self.pending.take();
        if state.is_some() {
            self.fired += 1;
        }
        state
    }

    /// Drop the pending state without firing
    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.pending = None;
    }

    /// Whether a firing is pending
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of times the debouncer has released a state
    pub fn fire_count(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_burst_coalesces_to_last_state() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(300 * MS);

        for i in 0..50u32 {
            debouncer.notify(start + (i * 10) * MS, i);
        }

        // Last notify at 490ms
        assert_eq!(debouncer.poll(start + 700 * MS), None);
        assert_eq!(debouncer.poll(start + 790 * MS), Some(49));
        assert_eq!(debouncer.poll(start + 2000 * MS), None);
        assert_eq!(debouncer.fire_count(), 1);
    }

    #[test]
    fn test_separate_quiet_periods_fire_separately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(200 * MS);

        debouncer.notify(start, "first");
        assert_eq!(debouncer.poll(start + 200 * MS), Some("first"));

        debouncer.notify(start + 500 * MS, "second");
        assert_eq!(debouncer.poll(start + 700 * MS), Some("second"));
        assert_eq!(debouncer.fire_count(), 2);
    }

    #[test]
    fn test_cancel_discards_pending() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(200 * MS);
        debouncer.notify(start, 1);
        debouncer.cancel();

        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(start + 1000 * MS), None);
        assert_eq!(debouncer.fire_count(), 0);
    }

    #[test]
    fn test_flush_releases_immediately() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(200 * MS);
        debouncer.notify(start, 7);

        assert_eq!(debouncer.flush(), Some(7));
        assert_eq!(debouncer.poll(start + 1000 * MS), None);
    }

    #[test]
    fn test_default_intervals() {
        assert_eq!(TEXT_CHANGE_INTERVAL, 300 * MS);
        assert_eq!(SCROLL_IDLE_INTERVAL, 200 * MS);
    }
}

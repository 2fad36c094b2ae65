//! Cooperative timers for the interactive thread
//!
//! Nothing here sleeps or spawns. The owner polls each timer with the
//! current instant from its event loop tick, and a timer reports whether
//! it fired. Tests drive time by passing synthetic instants.

use std::time::{Duration, Instant};

/// Single-shot countdown that can be re-armed
///
/// Re-arming replaces the pending deadline, so a burst of `arm` calls
/// produces one firing, `interval` after the last call.
#[derive(Debug, Clone)]
pub struct SingleShotTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl SingleShotTimer {
    /// Create a disarmed timer with the given countdown
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Countdown length
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the countdown length
    ///
    /// Applies from the next `arm`; a pending deadline is left untouched.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Start (or restart) the countdown from `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    /// Drop the pending deadline without firing
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a deadline is pending
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire if the deadline has passed
    ///
    /// Returns `true` exactly once per arming.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Periodic timer
///
/// Fires once per elapsed period. If the loop stalls for several periods
/// the missed ticks collapse into a single firing.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl IntervalTimer {
    /// Create a stopped timer
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Period length
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking; the first tick is one period after `now`
    pub fn start(&mut self, now: Instant) {
        self.next = Some(now + self.interval);
    }

    /// Stop ticking
    pub fn stop(&mut self) {
        self.next = None;
    }

    /// Whether the timer is running
    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Force a tick at `now` and restart the period from there
    ///
    /// Has no effect on a stopped timer.
    pub fn fire_now(&mut self, now: Instant) -> bool {
        if self.next.is_none() {
            return false;
        }
        self.next = Some(now + self.interval);
        true
    }

    /// Fire if a period has elapsed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now >= next => {
                let mut upcoming = next + self.interval;
                if upcoming <= now {
                    upcoming = now + self.interval;
                }
                self.next = Some(upcoming);
                true
            }
            _ => false,
        }
    }
}

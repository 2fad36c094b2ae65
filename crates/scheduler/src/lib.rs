//! Docshell Scheduler Library
//!
//! Background I/O and interactive-thread timing primitives.
//!
//! Blocking file reads and writes run on a single [`IoWorker`] thread that
//! processes requests in FIFO order and delivers results over a channel.
//! Everything else runs on the interactive thread, driven by cooperative
//! timers ([`SingleShotTimer`], [`IntervalTimer`]) and [`Debouncer`]s that
//! the event loop polls with the current instant. [`Liveness`] tokens let a
//! closed view turn late results into silent no-ops.
//!
//! # Example
//!
//! ```
//! use docshell_scheduler::{Debouncer, Liveness};
//! use std::time::{Duration, Instant};
//!
//! let liveness = Liveness::new();
//! let token = liveness.token();
//!
//! let start = Instant::now();
//! let mut debouncer = Debouncer::new(Duration::from_millis(200));
//! debouncer.notify(start, 42);
//! assert_eq!(debouncer.poll(start + Duration::from_millis(250)), Some(42));
//!
//! liveness.revoke();
//! assert!(!token.is_live());
//! ```

mod debounce;
mod error;
mod io;
mod liveness;
mod timer;

// Re-export public API
pub use debounce::{Debouncer, SCROLL_IDLE_INTERVAL, TEXT_CHANGE_INTERVAL};
pub use error::IoError;
pub use io::{
    perform_file_io, Content, IoExecutor, IoOperation, IoStats, IoWorker, IoWorkerConfig,
    LoadResult, RequestId, WorkItem,
};
pub use liveness::{Liveness, LivenessToken};
pub use timer::{IntervalTimer, SingleShotTimer};

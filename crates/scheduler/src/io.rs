//! Background I/O worker for document loads and saves
//!
//! One dedicated thread drains a FIFO queue of [`WorkItem`]s, performs the
//! blocking file operation and sends a [`LoadResult`] back over a channel.
//! The interactive thread owns the [`IoWorker`] handle: it enqueues work
//! without blocking and drains results during its own event loop tick. The
//! worker never touches view or cache state directly.

use crate::error::IoError;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Identifier assigned to each accepted work item
pub type RequestId = u64;

/// Kind of file operation a work item performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoOperation {
    /// Read the whole file and decode it as UTF-8
    ReadText,
    /// Read the whole file as raw bytes
    ReadBytes,
    /// Replace the file with the item's payload
    Write,
}

/// Queued unit of background I/O
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: RequestId,
    pub operation: IoOperation,
    pub target: PathBuf,
    /// Bytes to write; empty for reads
    pub payload: Vec<u8>,
}

/// Successful outcome of a work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
    Written { bytes: usize },
}

/// Outcome of one consumed work item, delivered exactly once
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub request: RequestId,
    pub operation: IoOperation,
    pub target: PathBuf,
    pub outcome: Result<Content, IoError>,
}

impl LoadResult {
    /// Whether the operation succeeded
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Human-readable failure cause, if the operation failed
    pub fn error_message(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|e| e.to_string())
    }
}

/// Function performing a work item on the worker thread.
///
/// The default performs real file I/O; tests substitute their own.
pub type IoExecutor = Arc<dyn Fn(&WorkItem) -> Result<Content, IoError> + Send + Sync>;

/// Configuration for the I/O worker.
#[derive(Debug, Clone)]
pub struct IoWorkerConfig {
    /// Maximum time the worker waits on the queue before re-checking the stop flag.
    /// Default: 100ms.
    pub poll_interval: Duration,

    /// Maximum time `shutdown` waits for the thread to exit.
    /// Default: 1000ms.
    pub join_timeout: Duration,

    /// Suppress a read while an identical read of the same target is in flight.
    /// Default: false.
    pub dedupe_in_flight: bool,
}

impl Default for IoWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            join_timeout: Duration::from_millis(1000),
            dedupe_in_flight: false,
        }
    }
}

impl IoWorkerConfig {
    /// Create a new worker configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the bounded join timeout used at shutdown.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Enable or disable in-flight de-duplication of reads.
    pub fn with_dedupe_in_flight(mut self, dedupe: bool) -> Self {
        self.dedupe_in_flight = dedupe;
        self
    }
}

/// Counters describing worker traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Items accepted into the queue
    pub enqueued: u64,
    /// Reads suppressed by de-duplication
    pub suppressed: u64,
    /// Results handed to the interactive thread
    pub delivered: u64,
    /// Delivered results that were failures
    pub failed: u64,
    /// Accepted items whose result has not been drained yet
    pub in_flight: usize,
}

/// Handle to the background I/O thread.
///
/// # Example
///
/// ```no_run
/// use docshell_scheduler::{IoWorker, IoWorkerConfig};
/// use std::time::Duration;
///
/// let mut worker = IoWorker::new(IoWorkerConfig::default()).unwrap();
/// worker.read_text("/tmp/notes.txt");
///
/// for result in worker.drain_blocking(Duration::from_secs(1)) {
///     match result.outcome {
///         Ok(content) => println!("loaded {:?}", content),
///         Err(error) => println!("failed: {}", error),
///     }
/// }
///
/// worker.shutdown();
/// ```
pub struct IoWorker {
    config: IoWorkerConfig,
    queue: Option<Sender<WorkItem>>,
    results: Receiver<LoadResult>,
    finished: Receiver<()>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    next_id: RequestId,
    in_flight: HashMap<(IoOperation, PathBuf), usize>,
    stats: IoStats,
}

impl IoWorker {
    /// Start a worker that performs real file I/O.
    pub fn new(config: IoWorkerConfig) -> std::io::Result<Self> {
        Self::with_executor(config, Arc::new(perform_file_io))
    }

    /// Start a worker with a custom executor.
    pub fn with_executor(config: IoWorkerConfig, executor: IoExecutor) -> std::io::Result<Self> {
        let (queue_tx, queue_rx) = unbounded::<WorkItem>();
        let (result_tx, result_rx) = unbounded::<LoadResult>();
        let (finished_tx, finished_rx) = unbounded::<()>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let poll_interval = config.poll_interval;

        let thread = thread::Builder::new()
            .name("docshell-io".to_string())
            .spawn(move || {
                Self::run(queue_rx, result_tx, executor, stop_clone, poll_interval);
                let _ = finished_tx.send(());
            })?;

        log::debug!("I/O worker started");

        Ok(Self {
            config,
            queue: Some(queue_tx),
            results: result_rx,
            finished: finished_rx,
            stop,
            thread: Some(thread),
            next_id: 1,
            in_flight: HashMap::new(),
            stats: IoStats::default(),
        })
    }

    /// Queue a work item. Never blocks.
    ///
    /// Returns the request id, or `None` if the worker is stopped or the
    /// read was suppressed as a duplicate of one already in flight.
    pub fn enqueue(
        &mut self,
        operation: IoOperation,
        target: impl Into<PathBuf>,
        payload: Vec<u8>,
    ) -> Option<RequestId> {
        let target = target.into();
        let queue = match &self.queue {
            Some(queue) if !self.is_stopped() => queue,
            _ => {
                log::warn!("I/O worker stopped; dropping request for {}", target.display());
                return None;
            }
        };

        let key = (operation, target.clone());
        if self.config.dedupe_in_flight
            && operation != IoOperation::Write
            && self.in_flight.contains_key(&key)
        {
            log::debug!("suppressing duplicate read of {}", target.display());
            self.stats.suppressed += 1;
            return None;
        }

        let id = self.next_id;
        let item = WorkItem {
            id,
            operation,
            target,
            payload,
        };

        if queue.send(item).is_err() {
            log::warn!("I/O worker queue disconnected");
            return None;
        }

        self.next_id += 1;
        *self.in_flight.entry(key).or_insert(0) += 1;
        self.stats.enqueued += 1;
        self.stats.in_flight += 1;
        Some(id)
    }

    /// Queue a full UTF-8 read of `target`.
    pub fn read_text(&mut self, target: impl Into<PathBuf>) -> Option<RequestId> {
        self.enqueue(IoOperation::ReadText, target, Vec::new())
    }

    /// Queue a full binary read of `target`.
    pub fn read_bytes(&mut self, target: impl Into<PathBuf>) -> Option<RequestId> {
        self.enqueue(IoOperation::ReadBytes, target, Vec::new())
    }

    /// Queue a write of `payload` to `target`.
    pub fn write(&mut self, target: impl Into<PathBuf>, payload: Vec<u8>) -> Option<RequestId> {
        self.enqueue(IoOperation::Write, target, payload)
    }

    /// Take every result delivered so far, in completion order. Never blocks.
    pub fn drain(&mut self) -> Vec<LoadResult> {
        let results: Vec<LoadResult> = self.results.try_iter().collect();
        for result in &results {
            self.record_delivery(result);
        }
        results
    }

    /// Wait up to `timeout` for at least one result, then drain.
    ///
    /// Meant for headless drivers and tests; the interactive loop uses `drain`.
    pub fn drain_blocking(&mut self, timeout: Duration) -> Vec<LoadResult> {
        let mut results = Vec::new();
        if let Ok(first) = self.results.recv_timeout(timeout) {
            self.record_delivery(&first);
            results.push(first);
        }
        results.extend(self.drain());
        results
    }

    fn record_delivery(&mut self, result: &LoadResult) {
        let key = (result.operation, result.target.clone());
        if let Some(count) = self.in_flight.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&key);
            }
        }
        self.stats.delivered += 1;
        self.stats.in_flight = self.stats.in_flight.saturating_sub(1);
        if !result.is_success() {
            self.stats.failed += 1;
        }
    }

    /// Whether a read of `target` is queued or running.
    pub fn is_in_flight(&self, operation: IoOperation, target: &Path) -> bool {
        self.in_flight
            .contains_key(&(operation, target.to_path_buf()))
    }

    /// Traffic counters.
    pub fn stats(&self) -> IoStats {
        self.stats
    }

    /// Whether the stop flag has been raised.
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop the worker cooperatively.
    ///
    /// Raises the stop flag, then waits at most `join_timeout` for the
    /// thread to exit. Queued items that have not started are abandoned.
    /// Returns `true` if the thread was joined, `false` if it was detached
    /// or had already been shut down.
    pub fn shutdown(&mut self) -> bool {
        let Some(thread) = self.thread.take() else {
            return false;
        };

        self.stop.store(true, Ordering::Release);
        self.queue = None;

        match self.finished.recv_timeout(self.config.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    log::error!("I/O worker thread panicked");
                }
                log::debug!("I/O worker stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "I/O worker did not stop within {:?}; detaching",
                    self.config.join_timeout
                );
                false
            }
        }
    }

    /// Main worker loop.
    ///
    /// Waits on the queue with a bounded timeout so a raised stop flag is
    /// observed promptly. A failing or panicking item is reported as a
    /// failure result; the loop keeps draining.
    fn run(
        queue: Receiver<WorkItem>,
        results: Sender<LoadResult>,
        executor: IoExecutor,
        stop: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if stop.load(Ordering::Acquire) {
                break;
            }

            let item = match queue.recv_timeout(poll_interval) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            if stop.load(Ordering::Acquire) {
                break;
            }

            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| executor(&item))) {
                Ok(outcome) => outcome,
                Err(payload) => Err(IoError::WorkerFault {
                    target: item.target.clone(),
                    message: panic_message(payload.as_ref()),
                }),
            };

            if let Err(error) = &outcome {
                log::warn!("I/O request {} failed: {}", item.id, error);
            }

            let result = LoadResult {
                request: item.id,
                operation: item.operation,
                target: item.target,
                outcome,
            };

            if results.send(result).is_err() {
                break;
            }
        }
    }
}

impl Drop for IoWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Default executor: blocking file-system I/O.
pub fn perform_file_io(item: &WorkItem) -> Result<Content, IoError> {
    let target = item.target.as_path();
    match item.operation {
        IoOperation::ReadText => {
            let bytes = fs::read(target).map_err(|e| IoError::from_io(target, e))?;
            String::from_utf8(bytes)
                .map(Content::Text)
                .map_err(|e| IoError::Encoding {
                    target: target.to_path_buf(),
                    message: e.utf8_error().to_string(),
                })
        }
        IoOperation::ReadBytes => fs::read(target)
            .map(Content::Bytes)
            .map_err(|e| IoError::from_io(target, e)),
        IoOperation::Write => fs::write(target, &item.payload)
            .map(|()| Content::Written {
                bytes: item.payload.len(),
            })
            .map_err(|e| IoError::from_io(target, e)),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

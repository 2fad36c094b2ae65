//! Memory governor for bounded render caches
//!
//! A process-scoped service that keeps registered caches within their
//! declared sizes and reacts to resident-memory pressure. It runs two
//! independent periodic sweeps on the interactive thread:
//!
//! - the cache sweep trims every registered cache back to its registered
//!   maximum (oldest entries first) and requests a collection pass;
//! - the pressure sweep samples resident memory and, above the ceiling,
//!   forces a cache sweep followed by several collection passes.
//!
//! This is best-effort: between sweeps a producer can transiently exceed
//! its registered maximum. Nothing is ever surfaced to callers.

use crate::bounded::Evictable;
use crate::resident::{CollectionHook, ProcResidentMemory, ResidentMemory, TrimHook};
use docshell_scheduler::IntervalTimer;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Memory pressure level of a resident-memory sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    /// Below 80% of the ceiling
    Normal,
    /// Between 80% of the ceiling and the ceiling
    Elevated,
    /// Above the ceiling
    Critical,
}

impl MemoryPressure {
    /// Classify a sample against a ceiling
    pub fn classify(resident: u64, ceiling: u64) -> Self {
        if ceiling == 0 || resident > ceiling {
            MemoryPressure::Critical
        } else if resident as f64 >= ceiling as f64 * 0.8 {
            MemoryPressure::Elevated
        } else {
            MemoryPressure::Normal
        }
    }

    /// Returns true if the governor must reclaim memory now
    pub fn needs_eviction(&self) -> bool {
        matches!(self, MemoryPressure::Critical)
    }
}

/// Configuration for the memory governor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Period of the cache sweep
    pub sweep_interval: Duration,
    /// Period of the pressure sweep
    pub pressure_interval: Duration,
    /// Resident-memory ceiling in bytes
    pub memory_ceiling: u64,
    /// Collection passes requested when the ceiling is exceeded
    pub pressure_collections: u32,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(30_000),
            pressure_interval: Duration::from_millis(10_000),
            memory_ceiling: 500 * 1024 * 1024,
            pressure_collections: 3,
        }
    }
}

impl GovernorConfig {
    /// Create a configuration with a ceiling in megabytes
    ///
    /// Ceilings too large to express in bytes saturate at `u64::MAX`.
    pub fn new(memory_ceiling_mb: u64) -> Self {
        Self {
            memory_ceiling: memory_ceiling_mb.saturating_mul(1024 * 1024),
            ..Default::default()
        }
    }

    /// Set the cache sweep period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the pressure sweep period
    pub fn with_pressure_interval(mut self, interval: Duration) -> Self {
        self.pressure_interval = interval;
        self
    }

    /// Set the number of collection passes requested under pressure
    pub fn with_pressure_collections(mut self, passes: u32) -> Self {
        self.pressure_collections = passes;
        self
    }
}

/// Counters describing governor activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorStats {
    /// Cache sweeps run (periodic and forced)
    pub sweeps: u64,
    /// Entries evicted by sweeps
    pub entries_evicted: u64,
    /// Pressure sweeps that found the ceiling exceeded
    pub pressure_events: u64,
    /// Collection passes requested
    pub collections: u64,
    /// Most recent resident-memory sample in bytes
    pub last_resident: Option<u64>,
}

struct Registration {
    cache: Weak<RefCell<dyn Evictable>>,
    identity: *const (),
    max_entries: usize,
}

/// Process-scoped memory governor
///
/// Created with [`MemoryGovernor::init`], ticked from the interactive event
/// loop, and stopped with [`MemoryGovernor::shutdown`]. It holds only weak
/// references to registered caches: it mutates them during sweeps but does
/// not keep them alive.
///
/// # Example
///
/// ```
/// use docshell_cache::{BoundedCache, GovernorConfig, MemoryGovernor};
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut governor = MemoryGovernor::init(GovernorConfig::default(), start);
///
/// let cache = BoundedCache::<u32, Vec<u8>>::shared("pages", 64);
/// governor.register(&cache, 2);
/// for page in 0..5 {
///     cache.borrow_mut().insert(page, vec![0; 16]);
/// }
///
/// governor.tick(start + Duration::from_secs(30));
/// assert_eq!(cache.borrow().len(), 2);
/// ```
pub struct MemoryGovernor {
    config: GovernorConfig,
    registrations: Vec<Registration>,
    sweep_timer: IntervalTimer,
    pressure_timer: IntervalTimer,
    resident: Box<dyn ResidentMemory>,
    collector: Box<dyn CollectionHook>,
    stats: GovernorStats,
    running: bool,
}

impl MemoryGovernor {
    /// Start a governor that samples `/proc` and trims the glibc heap
    pub fn init(config: GovernorConfig, now: Instant) -> Self {
        Self::with_hooks(
            config,
            Box::new(ProcResidentMemory),
            Box::new(TrimHook),
            now,
        )
    }

    /// Start a governor with custom sampling and collection hooks
    pub fn with_hooks(
        config: GovernorConfig,
        resident: Box<dyn ResidentMemory>,
        collector: Box<dyn CollectionHook>,
        now: Instant,
    ) -> Self {
        let mut sweep_timer = IntervalTimer::new(config.sweep_interval);
        let mut pressure_timer = IntervalTimer::new(config.pressure_interval);
        sweep_timer.start(now);
        pressure_timer.start(now);

        log::debug!(
            "memory governor started (sweep {:?}, pressure {:?}, ceiling {} MB)",
            config.sweep_interval,
            config.pressure_interval,
            config.memory_ceiling / (1024 * 1024)
        );

        Self {
            config,
            registrations: Vec::new(),
            sweep_timer,
            pressure_timer,
            resident,
            collector,
            stats: GovernorStats::default(),
            running: true,
        }
    }

    /// Register a cache to be kept at or below `max_entries`
    ///
    /// Idempotent: registering the same cache again only updates its maximum.
    pub fn register<C>(&mut self, cache: &Rc<RefCell<C>>, max_entries: usize)
    where
        C: Evictable + 'static,
    {
        let identity = Rc::as_ptr(cache) as *const ();
        if let Some(existing) = self
            .registrations
            .iter_mut()
            .find(|r| r.identity == identity && r.cache.strong_count() > 0)
        {
            existing.max_entries = max_entries;
            return;
        }

        let erased: Rc<RefCell<dyn Evictable>> = cache.clone();
        self.registrations.push(Registration {
            cache: Rc::downgrade(&erased),
            identity,
            max_entries,
        });
    }

    /// Number of registered caches that are still alive
    pub fn registered_count(&self) -> usize {
        self.registrations
            .iter()
            .filter(|r| r.cache.strong_count() > 0)
            .count()
    }

    /// Run whichever sweeps are due at `now`
    ///
    /// A no-op after `shutdown`.
    pub fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }
        if self.pressure_timer.poll(now)
            && self
                .pressure_sweep()
                .is_some_and(|pressure| pressure.needs_eviction())
        {
            // The forced sweep restarts the periodic one
            self.sweep_timer.fire_now(now);
        }
        if self.sweep_timer.poll(now) {
            self.cache_sweep();
        }
    }

    /// Trim every registered cache to its registered maximum
    ///
    /// Returns the number of entries evicted.
    pub fn cache_sweep(&mut self) -> usize {
        self.registrations.retain(|r| r.cache.strong_count() > 0);

        let mut evicted = 0;
        for registration in &self.registrations {
            let Some(cache) = registration.cache.upgrade() else {
                continue;
            };
            let Ok(mut cache) = cache.try_borrow_mut() else {
                log::debug!("cache busy during sweep; skipping");
                continue;
            };

            let size = cache.entry_count();
            if size > registration.max_entries {
                let removed = cache.evict_oldest_entries(size - registration.max_entries);
                log::debug!(
                    "sweep evicted {} entries from {} ({} -> {})",
                    removed,
                    cache.cache_name(),
                    size,
                    cache.entry_count()
                );
                evicted += removed;
            }
        }

        self.stats.sweeps += 1;
        self.stats.entries_evicted += evicted as u64;
        self.request_collections(1);
        evicted
    }

    /// Sample resident memory and reclaim if above the ceiling
    ///
    /// Returns the pressure level of the sample, or `None` if no sample was
    /// available.
    pub fn pressure_sweep(&mut self) -> Option<MemoryPressure> {
        let resident = self.resident.sample()?;
        self.stats.last_resident = Some(resident);

        let pressure = MemoryPressure::classify(resident, self.config.memory_ceiling);
        if pressure.needs_eviction() {
            log::warn!(
                "resident memory {} MB above ceiling {} MB; forcing cache sweep",
                resident / (1024 * 1024),
                self.config.memory_ceiling / (1024 * 1024)
            );
            self.stats.pressure_events += 1;
            self.cache_sweep();
            self.request_collections(self.config.pressure_collections);
        }
        Some(pressure)
    }

    fn request_collections(&mut self, passes: u32) {
        for _ in 0..passes {
            self.collector.collect();
        }
        self.stats.collections += passes as u64;
    }

    /// Stop both sweeps and forget every registration
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.sweep_timer.stop();
        self.pressure_timer.stop();
        self.registrations.clear();
        log::debug!("memory governor stopped");
    }

    /// Whether the governor is still ticking
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Activity counters
    pub fn stats(&self) -> GovernorStats {
        self.stats
    }

    /// Configuration in use
    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }
}

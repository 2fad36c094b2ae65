//! Docshell Cache Library
//!
//! Entry-bounded render caches with FIFO eviction, and the memory governor
//! that keeps them within their registered sizes under resident-memory
//! pressure.

pub mod bounded;
pub mod governor;
pub mod resident;

pub use bounded::{BoundedCache, CacheStats, Evictable, SharedCache};
pub use governor::{GovernorConfig, GovernorStats, MemoryGovernor, MemoryPressure};
pub use resident::{CollectionHook, ProcResidentMemory, ResidentMemory, TrimHook};

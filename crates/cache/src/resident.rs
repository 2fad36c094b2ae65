//! Process memory sampling and collection hooks
//!
//! The governor samples resident memory to detect pressure and asks the
//! allocator to hand freed pages back to the OS after evicting entries.
//! Both are behind traits so hosts and tests can substitute their own.

/// Source of the process resident-set size
pub trait ResidentMemory {
    /// Current resident memory in bytes, or `None` if unavailable
    fn sample(&mut self) -> Option<u64>;
}

/// Reads the resident-set size from `/proc/self/statm`
///
/// Returns `None` on platforms without procfs, which turns the pressure
/// sweep into a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcResidentMemory;

impl ResidentMemory for ProcResidentMemory {
    #[cfg(target_os = "linux")]
    fn sample(&mut self) -> Option<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            return None;
        }
        Some(resident_pages.saturating_mul(page_size as u64))
    }

    #[cfg(not(target_os = "linux"))]
    fn sample(&mut self) -> Option<u64> {
        None
    }
}

/// Something that can reclaim freed memory after an eviction
pub trait CollectionHook {
    /// Run one collection pass
    fn collect(&mut self);
}

/// Asks glibc to return free heap pages to the OS
///
/// A no-op on other allocators.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrimHook;

impl CollectionHook for TrimHook {
    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    fn collect(&mut self) {
        unsafe {
            libc::malloc_trim(0);
        }
    }

    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    fn collect(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn test_proc_sample_is_nonzero() {
        let sample = ProcResidentMemory.sample().expect("procfs should be readable");
        assert!(sample > 0);
    }

    #[test]
    fn test_trim_hook_is_callable() {
        let mut hook = TrimHook;
        hook.collect();
        hook.collect();
    }
}

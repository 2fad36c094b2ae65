//! Entry-bounded render cache with insertion-order eviction
//!
//! Stores expensive render artifacts (decoded pages, highlight spans,
//! preview HTML) under a hard entry-count ceiling. When an insertion would
//! exceed the ceiling, the oldest *inserted* entry goes first. Lookups do
//! not refresh an entry's position: eviction is FIFO, not LRU.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently in cache
    pub entry_count: usize,

    /// Maximum number of entries allowed
    pub max_entries: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Number of entries evicted by capacity or sweeps
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A cache shared between its owning view and the memory governor.
///
/// Both sides live on the interactive thread.
pub type SharedCache<K, V> = Rc<RefCell<BoundedCache<K, V>>>;

/// Ordered key → artifact map with a hard maximum entry count
///
/// # Example
///
/// ```
/// use docshell_cache::BoundedCache;
///
/// let mut cache = BoundedCache::new("pages", 2);
/// cache.insert(1, "one");
/// cache.insert(2, "two");
/// let evicted = cache.insert(3, "three");
///
/// assert_eq!(evicted, vec![1]);
/// assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    name: String,
    entries: HashMap<K, V>,
    /// Insertion order (oldest at front)
    order: VecDeque<K>,
    max_entries: usize,
    stats: CacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `max_entries` entries (minimum 1)
    pub fn new(name: impl Into<String>, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            name: name.into(),
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
            stats: CacheStats {
                max_entries,
                ..Default::default()
            },
        }
    }

    /// Create a cache wrapped for sharing with the memory governor
    pub fn shared(name: impl Into<String>, max_entries: usize) -> SharedCache<K, V> {
        Rc::new(RefCell::new(Self::new(name, max_entries)))
    }

    /// Name used in log output
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry, recording a hit or miss
    ///
    /// The entry's eviction position is unchanged.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Look up an entry without touching statistics
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Check whether a key is cached
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Store an entry, evicting the oldest entries first if at capacity
    ///
    /// Re-inserting an existing key replaces its value and makes it the
    /// newest entry. Returns the evicted keys, oldest first.
    pub fn insert(&mut self, key: K, value: V) -> Vec<K> {
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }

        let overflow = (self.entries.len() + 1).saturating_sub(self.max_entries);
        let evicted = self.evict_oldest(overflow);

        self.entries.insert(key.clone(), value);
        self.order.push_back(key);
        self.stats.entry_count = self.entries.len();
        evicted
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        self.stats.entry_count = self.entries.len();
        Some(value)
    }

    /// Evict up to `count` of the oldest entries, returning their keys
    pub fn evict_oldest(&mut self, count: usize) -> Vec<K> {
        let mut evicted = Vec::with_capacity(count.min(self.order.len()));
        while evicted.len() < count {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&key).is_some() {
                self.stats.evictions += 1;
                evicted.push(key);
            }
        }
        self.stats.entry_count = self.entries.len();
        evicted
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats.entry_count = 0;
    }

    /// Keys in insertion order, oldest first
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Number of entries currently cached
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Change the ceiling, evicting oldest entries if now over it
    pub fn set_max_entries(&mut self, max_entries: usize) -> Vec<K> {
        self.max_entries = max_entries.max(1);
        self.stats.max_entries = self.max_entries;
        let overflow = self.entries.len().saturating_sub(self.max_entries);
        self.evict_oldest(overflow)
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Type-erased view of a cache, as seen by the memory governor
pub trait Evictable {
    /// Name used in log output
    fn cache_name(&self) -> &str;

    /// Current number of entries
    fn entry_count(&self) -> usize;

    /// Evict up to `count` oldest entries; returns how many were evicted
    fn evict_oldest_entries(&mut self, count: usize) -> usize;
}

impl<K, V> Evictable for BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn cache_name(&self) -> &str {
        self.name()
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn evict_oldest_entries(&mut self, count: usize) -> usize {
        self.evict_oldest(count).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;

    #[test]
    fn test_basic_insert_get() {
        let mut cache = BoundedCache::new("test", 4);
        cache.insert("a", vec![1u8, 2, 3]);

        assert_eq!(cache.get(&"a"), Some(&vec![1u8, 2, 3]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let mut cache: BoundedCache<u32, u32> = BoundedCache::new("test", 4);
        assert!(cache.get(&999).is_none());

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let mut cache = BoundedCache::new("test", 0);
        assert_eq!(cache.max_entries(), 1);
        cache.insert(1, ());
        cache.insert(2, ());
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_fifo_eviction() {
        let mut cache = BoundedCache::new("test", 2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        let evicted = cache.insert(3, "three");

        assert_eq!(evicted, vec![1]);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_access_does_not_protect_from_eviction() {
        let mut cache = BoundedCache::new("test", 2);
        cache.insert(1, "one");
        cache.insert(2, "two");

        // A hit on the oldest entry does not make it newer
        assert!(cache.get(&1).is_some());
        cache.insert(3, "three");

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_reinsert_moves_to_newest() {
        let mut cache = BoundedCache::new("test", 2);
        cache.insert(1, "one");
        cache.insert(2, "two");
        cache.insert(1, "uno");
        cache.insert(3, "three");

        assert_eq!(cache.peek(&1), Some(&"uno"));
        assert!(!cache.contains(&2));
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut rng = rand::thread_rng();
        let mut cache = BoundedCache::new("test", 16);

        for _ in 0..1000 {
            let key: u32 = rng.gen_range(0..64);
            cache.insert(key, key);
            assert!(cache.len() <= 16);
        }
    }

    #[test]
    fn test_evicted_set_is_oldest_prefix() {
        let mut rng = rand::thread_rng();
        let mut keys: Vec<u32> = (0..40).collect();
        keys.shuffle(&mut rng);

        let capacity = 25;
        let mut cache = BoundedCache::new("test", 100);
        for key in &keys {
            cache.insert(*key, ());
        }

        let evicted = cache.set_max_entries(capacity);
        assert_eq!(evicted, keys[..keys.len() - capacity].to_vec());
        assert_eq!(
            cache.keys().copied().collect::<Vec<_>>(),
            keys[keys.len() - capacity..].to_vec()
        );
    }

    #[test]
    fn test_remove() {
        let mut cache = BoundedCache::new("test", 4);
        cache.insert(1, "one");

        assert_eq!(cache.remove(&1), Some("one"));
        assert!(!cache.contains(&1));
        assert!(cache.remove(&1).is_none());
        assert_eq!(cache.keys().count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut cache = BoundedCache::new("test", 4);
        cache.insert(1, ());
        cache.insert(2, ());
        cache.insert(3, ());

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().entry_count, 0);
        assert_eq!(cache.keys().count(), 0);
    }

    #[test]
    fn test_stats_hit_rate() {
        let mut cache = BoundedCache::new("test", 4);
        cache.insert(1, ());

        let _ = cache.get(&1);
        let _ = cache.get(&2);
        let _ = cache.get(&3);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert!((stats.hit_rate() - 0.333).abs() < 0.01);
    }

    #[test]
    fn test_evictable_view() {
        let shared: SharedCache<u32, ()> = BoundedCache::shared("pages", 8);
        for key in 0..5 {
            shared.borrow_mut().insert(key, ());
        }

        let erased: Rc<RefCell<dyn Evictable>> = shared.clone();
        assert_eq!(erased.borrow().cache_name(), "pages");
        assert_eq!(erased.borrow().entry_count(), 5);
        assert_eq!(erased.borrow_mut().evict_oldest_entries(2), 2);
        assert_eq!(shared.borrow().keys().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }
}

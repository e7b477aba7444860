//! Bounded cache of recently seen broadcast message ids.

use std::collections::{HashSet, VecDeque};

/// Remembers recent `message_id`s so repeated broadcasts are processed once.
///
/// Once an insertion pushes the cache above its high-water mark it is trimmed
/// to the most recently inserted ids, so older ids may be accepted again.
///
/// # Examples
///
/// ```
/// use atomberg_fans_rs::DedupCache;
///
/// let mut cache = DedupCache::new();
/// assert!(!cache.is_duplicate("m1"));
/// assert!(cache.is_duplicate("m1"));
///
/// // Empty ids are never tracked.
/// assert!(!cache.is_duplicate(""));
/// assert!(!cache.is_duplicate(""));
/// ```
#[derive(Debug, Clone)]
pub struct DedupCache {
    seen: HashSet<String>,
    order: VecDeque<String>,
    high_water: usize,
    retain: usize,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupCache {
    pub const DEFAULT_HIGH_WATER: usize = 100;
    pub const DEFAULT_RETAIN: usize = 50;

    pub fn new() -> Self {
        Self::with_limits(Self::DEFAULT_HIGH_WATER, Self::DEFAULT_RETAIN)
    }

    /// Create a cache that trims to `retain` ids whenever it grows past `high_water`.
    pub fn with_limits(high_water: usize, retain: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            high_water,
            retain: retain.min(high_water),
        }
    }

    /// Returns `true` if `id` was already seen; otherwise records it.
    pub fn is_duplicate(&mut self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        if self.seen.contains(id) {
            return true;
        }

        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());

        if self.order.len() > self.high_water {
            let excess = self.order.len() - self.retain;
            for old in self.order.drain(..excess) {
                self.seen.remove(&old);
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_is_duplicate() {
        let mut cache = DedupCache::new();
        assert!(!cache.is_duplicate("a"));
        assert!(!cache.is_duplicate("b"));
        assert!(cache.is_duplicate("a"));
        assert!(cache.is_duplicate("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_empty_id_is_not_recorded() {
        let mut cache = DedupCache::new();
        assert!(!cache.is_duplicate(""));
        assert!(!cache.is_duplicate(""));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stays_at_high_water() {
        let mut cache = DedupCache::new();
        for i in 0..100 {
            assert!(!cache.is_duplicate(&format!("id{i}")));
        }
        assert_eq!(cache.len(), 100);
        assert!(cache.is_duplicate("id0"));
    }

    #[test]
    fn test_trims_to_most_recent() {
        let mut cache = DedupCache::new();
        for i in 0..101 {
            cache.is_duplicate(&format!("id{i}"));
        }
        assert!(cache.len() <= 50);

        for i in 51..101 {
            assert!(cache.is_duplicate(&format!("id{i}")), "id{i} was evicted");
        }
        for i in 0..51 {
            assert!(!cache.is_duplicate(&format!("id{i}")), "id{i} was kept");
        }
    }

    #[test]
    fn test_custom_limits() {
        let mut cache = DedupCache::with_limits(3, 1);
        for id in ["a", "b", "c", "d"] {
            cache.is_duplicate(id);
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.is_duplicate("d"));
    }

    #[test]
    fn test_clear() {
        let mut cache = DedupCache::new();
        cache.is_duplicate("a");
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.is_duplicate("a"));
    }
}

//! Name cache
//!
//! Remembers target names learned from static data, keyed by identity. The
//! cache outlives the targets themselves: a vessel that expires and later
//! reappears with a position-only report gets its name back immediately.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use navtrack_core::TargetIdentity;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Bounded identity to name map, evicting the oldest learned name first.
pub struct NameCache {
    /// Names indexed by identity
    entries: DashMap<TargetIdentity, String>,
    /// Insertion order for eviction
    order: Mutex<VecDeque<TargetIdentity>>,
    /// Maximum number of names kept; zero disables the cache
    capacity: usize,
}

impl NameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Records the name of a target.
    ///
    /// Returns true if the name was not known before or has changed.
    pub fn remember(&self, identity: TargetIdentity, name: &str) -> bool {
        let name = name.trim();
        if self.capacity == 0 || name.is_empty() {
            return false;
        }

        match self.entries.entry(identity) {
            Entry::Occupied(mut existing) => {
                if existing.get() == name {
                    return false;
                }
                existing.insert(name.to_string());
                return true;
            }
            Entry::Vacant(slot) => {
                slot.insert(name.to_string());
            }
        }

        let mut order = self.order.lock();
        order.push_back(identity);
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        true
    }

    pub fn lookup(&self, identity: TargetIdentity) -> Option<String> {
        self.entries.get(&identity).map(|name| name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remember_and_lookup() {
        let cache = NameCache::new(10);
        let id = TargetIdentity::new(219_000_001);

        assert!(cache.remember(id, "NORDIC STAR"));
        assert!(!cache.remember(id, "NORDIC STAR"));
        assert_eq!(cache.lookup(id).as_deref(), Some("NORDIC STAR"));

        assert!(cache.remember(id, "NORDIC STAR II"));
        assert_eq!(cache.lookup(id).as_deref(), Some("NORDIC STAR II"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_blank_names_ignored() {
        let cache = NameCache::new(10);
        assert!(!cache.remember(TargetIdentity::new(1), "   "));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_evicted() {
        let cache = NameCache::new(2);
        cache.remember(TargetIdentity::new(1), "ALPHA");
        cache.remember(TargetIdentity::new(2), "BRAVO");
        cache.remember(TargetIdentity::new(3), "CHARLIE");

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(TargetIdentity::new(1)).is_none());
        assert_eq!(cache.lookup(TargetIdentity::new(3)).as_deref(), Some("CHARLIE"));
    }

    #[test]
    fn test_zero_capacity_disables_cache() {
        let cache = NameCache::new(0);
        assert!(!cache.remember(TargetIdentity::new(1), "ALPHA"));
        assert!(cache.lookup(TargetIdentity::new(1)).is_none());
    }
}

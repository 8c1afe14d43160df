// 🔒 Keyed locks - mutual exclusion scoped to one key
//
// One mutex per live key, created on first use and dropped again once no
// thread holds or waits on it. Different keys never contend.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    slots: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        KeyedLocks {
            slots: DashMap::new(),
        }
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// The lock is released when `f` returns or panics.
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let slot = Arc::clone(
            &self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );

        let result = {
            // The guarded value is (), so a poisoned lock carries no bad state
            let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        drop(slot);
        // Only the map's own reference left: nobody holds or waits on it
        self.slots.remove_if(key, |_, s| Arc::strong_count(s) == 1);

        result
    }

    /// Number of keys with a live lock slot
    pub fn live_keys(&self) -> usize {
        self.slots.len()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

//! FIFO memoization of a rounding rule.
//!
//! Records of one collection pass arrive in roughly ascending time order, so
//! the last few distinct timestamps cover most lookups. Entries are evicted in
//! insertion order; hits do not refresh an entry's position.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use tracing::debug;
use wyhash::WyHash;

use crate::rounding::Rounding;

/// Rounding rule wrapped with a fixed-capacity FIFO cache.
pub struct RoundingCache<R> {
    rule: R,
    cache: HashMap<i64, i64, BuildHasherDefault<WyHash>>,
    /// Keys in insertion order, used only to pick the next eviction.
    /// Grows up to `capacity` as keys arrive.
    ring: Vec<i64>,
    capacity: usize,
    /// Slot holding the oldest key once the ring is full
    next: usize,
    /// Number of times `rule` was evaluated
    computations: u64,
}

impl<R: Rounding> RoundingCache<R> {
    /// Create a cache holding at most `capacity` timestamps. Zero disables caching.
    ///
    /// Nothing is allocated up front, memory follows the number of cached keys.
    pub fn new(rule: R, capacity: usize) -> Self {
        debug!(capacity, "rounding cache created");
        Self {
            rule,
            cache: HashMap::default(),
            ring: Vec::new(),
            capacity,
            next: 0,
            computations: 0,
        }
    }

    /// Round `timestamp`, answering from the cache when possible
    #[inline]
    pub fn round(&mut self, timestamp: i64) -> i64 {
        if let Some(&rounded) = self.cache.get(&timestamp) {
            return rounded;
        }

        let rounded = self.rule.round(timestamp);
        self.computations += 1;

        if self.capacity == 0 {
            return rounded;
        }
        if self.ring.len() < self.capacity {
            self.ring.push(timestamp);
        } else {
            // full - the slot about to be reused holds the oldest key
            let oldest = std::mem::replace(&mut self.ring[self.next], timestamp);
            self.cache.remove(&oldest);
            self.next = (self.next + 1) % self.capacity;
        }
        self.cache.insert(timestamp, rounded);

        rounded
    }

    /// Number of times the underlying rule ran
    pub fn computations(&self) -> u64 {
        self.computations
    }

    /// Number of cached timestamps
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }
}

//! Kernel cache implementation
//!
//! Caches kernel values between pairs of resident exemplars. Each resident
//! exemplar owns one slot; a pair of slots addresses one cell of a strictly
//! lower-triangular matrix. Slots are recycled in least-recently-used order
//! and evicting a slot invalidates every cell in its row and column.
//! Diagonal values are never cached here.

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheQuery {
    /// Both exemplars are resident and the cell holds a value
    Hit,
    /// The pair may be cached but currently is not
    Miss,
    /// Diagonal pair, or one of the exemplars is not eligible for caching
    NotCacheable,
}

/// Bounded symmetric cache of kernel values
pub struct KernelCache {
    size: usize,
    /// exemplar -> slot, ordered by recency of use
    slots: LruCache<usize, usize>,
    /// slot -> exemplar
    invslot: Vec<Option<usize>>,
    free: Vec<usize>,
    cacheable: Vec<bool>,
    values: Vec<f64>,
    valid: Vec<bool>,
    frozen: bool,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a cache for `n` exemplars with room for `size` resident slots.
    /// Every exemplar starts out cacheable.
    pub fn new(n: usize, size: usize) -> Self {
        let size = size.min(n);
        let cells = size * size.saturating_sub(1) / 2;
        Self {
            size,
            slots: LruCache::unbounded(),
            invslot: vec![None; size],
            // popped from the back, so slot 0 is handed out first
            free: (0..size).rev().collect(),
            cacheable: vec![true; n],
            values: vec![0.0; cells],
            valid: vec![false; cells],
            frozen: false,
            hits: 0,
            misses: 0,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Number of resident exemplars
    pub fn resident(&self) -> usize {
        self.slots.len()
    }

    pub fn is_resident(&self, i: usize) -> bool {
        self.slots.contains(&i)
    }

    /// Slot currently held by exemplar `i`
    pub fn slot_of(&self, i: usize) -> Option<usize> {
        self.slots.peek(&i).copied()
    }

    /// Exemplar currently occupying `slot`
    pub fn exemplar_in(&self, slot: usize) -> Option<usize> {
        self.invslot.get(slot).copied().flatten()
    }

    /// Mark whether pairs involving `i` may be cached. Revoking releases the
    /// slot held by `i`.
    pub fn set_cacheable(&mut self, i: usize, cacheable: bool) {
        self.cacheable[i] = cacheable;
        if !cacheable {
            self.release(i);
        }
    }

    pub fn is_cacheable(&self, i: usize) -> bool {
        self.cacheable[i]
    }

    /// Suppress LRU promotion and evicting inserts while set
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Look up the pair (i, j), counting hits and misses
    pub fn query(&mut self, i: usize, j: usize) -> CacheQuery {
        if i == j || !self.cacheable[i] || !self.cacheable[j] || self.size < 2 {
            return CacheQuery::NotCacheable;
        }
        match (self.slot_of(i), self.slot_of(j)) {
            (Some(si), Some(sj)) if self.valid[Self::offset(si, sj)] => {
                self.hits += 1;
                CacheQuery::Hit
            }
            _ => {
                self.misses += 1;
                CacheQuery::Miss
            }
        }
    }

    /// Read a cached value, promoting both exemplars unless frozen
    pub fn access(&mut self, i: usize, j: usize) -> Option<f64> {
        if i == j {
            return None;
        }
        let (si, sj) = if self.frozen {
            (self.slot_of(i)?, self.slot_of(j)?)
        } else {
            (*self.slots.get(&i)?, *self.slots.get(&j)?)
        };
        let cell = Self::offset(si, sj);
        self.valid[cell].then(|| self.values[cell])
    }

    /// Store K(i, j), making both exemplars resident and evicting the least
    /// recently used slots as needed. Returns whether the value was stored.
    ///
    /// While frozen, values are only stored if both exemplars are already
    /// resident, so read-only audits never disturb the eviction order.
    pub fn insert(&mut self, i: usize, j: usize, value: f64) -> bool {
        if i == j || !self.cacheable[i] || !self.cacheable[j] || self.size < 2 {
            return false;
        }
        let slots = if self.frozen {
            self.slot_of(i).zip(self.slot_of(j))
        } else {
            self.acquire(i, j)
                .and_then(|si| self.acquire(j, i).map(|sj| (si, sj)))
        };
        match slots {
            Some((si, sj)) => {
                let cell = Self::offset(si, sj);
                self.values[cell] = value;
                self.valid[cell] = true;
                true
            }
            None => false,
        }
    }

    /// Drop exemplar `i` from the cache, invalidating its row and column
    pub fn release(&mut self, i: usize) {
        if let Some(slot) = self.slots.pop(&i) {
            self.invalidate_slot(slot);
            self.invslot[slot] = None;
            self.free.push(slot);
        }
    }

    /// Find or make a slot for `x` without evicting `pin`
    fn acquire(&mut self, x: usize, pin: usize) -> Option<usize> {
        if let Some(&slot) = self.slots.get(&x) {
            return Some(slot);
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                if self.slots.peek_lru().map(|(&e, _)| e) == Some(pin) {
                    self.slots.promote(&pin);
                }
                let (victim, slot) = self.slots.pop_lru()?;
                if victim == pin {
                    self.slots.put(victim, slot);
                    return None;
                }
                self.invalidate_slot(slot);
                slot
            }
        };
        self.slots.put(x, slot);
        self.invslot[slot] = Some(x);
        Some(slot)
    }

    fn invalidate_slot(&mut self, slot: usize) {
        for other in 0..self.size {
            if other != slot {
                self.valid[Self::offset(slot, other)] = false;
            }
        }
    }

    /// Linear offset of the cell addressed by two distinct slots
    fn offset(a: usize, b: usize) -> usize {
        debug_assert_ne!(a, b, "diagonal cells are not stored");
        let (hi, lo) = if a > b { (a, b) } else { (b, a) };
        hi * (hi - 1) / 2 + lo
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.size,
            size: self.slots.len(),
        }
    }

    /// Drop every resident slot and reset the counters
    pub fn clear(&mut self) {
        self.slots.clear();
        self.invslot.iter_mut().for_each(|s| *s = None);
        self.free = (0..self.size).rev().collect();
        self.valid.iter_mut().for_each(|v| *v = false);
        self.hits = 0;
        self.misses = 0;
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Slot capacity
    pub capacity: usize,
    /// Resident exemplars
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

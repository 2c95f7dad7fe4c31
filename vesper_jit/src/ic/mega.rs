//! The megamorphic property-access cache.
//!
//! A fixed-size, direct-mapped table keyed by (hidden class, property key),
//! shared by every megamorphic site in one execution context. Two instances
//! exist per context — one for loads, one for stores — identical in
//! structure, disjoint in population.
//!
//! # Design
//!
//! - 1024 slots, fixed at construction, never resized
//! - Direct-mapped: each key maps to exactly one slot; `set` overwrites
//!   unconditionally, so colliding pairs evict one another rather than
//!   chain or probe. O(1) worst case, bought with hit rate under collision —
//!   a deliberate trade, not a bug.
//! - `get` is total: misses and evictions both surface as the `NotFound`
//!   handler, which rides the same channel as real handlers. A cache may
//!   forget; it must never answer wrongly.
//! - Occupied slots hold a strong class reference, pinning the class for
//!   the life of the entry. A recycled class address therefore cannot alias
//!   a live entry, and the GC sees every pinned class via [`MegaIcCache::iterate`].

use std::cell::Cell;
use std::fmt;
use vesper_core::PropertyKey;
use vesper_runtime::gc::Tracer;
use vesper_runtime::handler::Handler;
use vesper_runtime::object::shape::{class_identity_word, HiddenClassRef};
use vesper_runtime::Trace;

// =============================================================================
// Constants
// =============================================================================

/// Number of cache slots (power of two, so masking replaces modulo).
pub const CACHE_LENGTH: usize = 1 << 10;

/// Mask for slot indexing.
const CACHE_MASK: usize = CACHE_LENGTH - 1;

/// Right shift applied to the class identity word before mixing, discarding
/// the always-zero low bits that heap alignment produces. Tunable;
/// alignment-dependent.
pub const HCLASS_SHIFT: u32 = 3;

/// Golden-ratio multiplicative constant for key-hash spreading.
const GOLDEN_RATIO: u32 = 0x9e37_79b9;

// =============================================================================
// Cache Entry
// =============================================================================

/// One cache slot: (hidden class, property key) → handler.
///
/// A slot is occupied iff `class` is present; empty slots carry the hole
/// key and the `NotFound` handler. Slots are only ever reset in bulk by
/// [`MegaIcCache::clear`], never deleted individually.
#[derive(Debug, Clone)]
pub struct PropertyKeyEntry {
    /// The cached class. Strong: the entry pins the class it caches.
    class: Option<HiddenClassRef>,
    /// The cached key.
    key: PropertyKey,
    /// The cached handler.
    handler: Handler,
}

impl PropertyKeyEntry {
    /// An empty slot.
    #[inline]
    fn empty() -> Self {
        Self {
            class: None,
            key: PropertyKey::hole(),
            handler: Handler::NotFound,
        }
    }

    /// Check slot occupancy.
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.class.is_some()
    }

    /// Check whether this slot caches exactly (class, key).
    #[inline]
    fn matches(&self, class: &HiddenClassRef, key: &PropertyKey) -> bool {
        match &self.class {
            Some(cached) => cached.id() == class.id() && &self.key == key,
            None => false,
        }
    }
}

// =============================================================================
// Hashing
// =============================================================================

/// Slot index for (class, key).
///
/// `cls_hash` shifts the stable class identity word right to drop alignment
/// zeros; `key_hash` is the key's pre-computed hash read straight off the
/// key (string-header hash for names, the value for indices). The mix —
/// `(cls * 31) ^ ((key * φ) ^ (key >> 16))` — keeps sequential integer keys
/// and bump-allocated (sequential-address) classes from clustering.
///
/// Pure in its inputs: the same class identity and key always map to the
/// same slot within a process run.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn slot_index(class: &HiddenClassRef, key: &PropertyKey) -> usize {
    let cls_hash = (class_identity_word(class) >> HCLASS_SHIFT) as u32;
    let key_hash = key.cached_hash();
    let mixed = cls_hash.wrapping_mul(31) ^ (key_hash.wrapping_mul(GOLDEN_RATIO) ^ (key_hash >> 16));
    (mixed as usize) & CACHE_MASK
}

// =============================================================================
// Megamorphic Cache
// =============================================================================

/// The shared megamorphic cache for one access direction (load or store).
///
/// Owned by the execution context; single-threaded, so no locking. Hit and
/// miss counters use `Cell` so the hot probe stays `&self`.
pub struct MegaIcCache {
    /// Slot storage, exactly [`CACHE_LENGTH`] long.
    entries: Box<[PropertyKeyEntry]>,
    /// Probe hits.
    hits: Cell<u64>,
    /// Probe misses (includes evicted entries — indistinguishable by
    /// design).
    misses: Cell<u64>,
    /// Total `set` calls.
    insertions: u64,
    /// `set` calls that overwrote a different live (class, key) pair.
    evictions: u64,
}

impl MegaIcCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![PropertyKeyEntry::empty(); CACHE_LENGTH].into_boxed_slice(),
            hits: Cell::new(0),
            misses: Cell::new(0),
            insertions: 0,
            evictions: 0,
        }
    }

    /// Probe for (class, key).
    ///
    /// One slot read and at most two equality comparisons. Returns the
    /// cached handler on an exact match and [`Handler::NotFound`] otherwise
    /// — "never inserted" and "evicted" are deliberately the same outcome.
    /// Total: no failure path.
    #[inline]
    pub fn get(&self, class: &HiddenClassRef, key: &PropertyKey) -> Handler {
        let entry = &self.entries[slot_index(class, key)];
        if entry.matches(class, key) {
            self.hits.set(self.hits.get() + 1);
            entry.handler
        } else {
            self.misses.set(self.misses.get() + 1);
            Handler::NotFound
        }
    }

    /// Insert (class, key) → handler, unconditionally overwriting whatever
    /// occupied the mapped slot.
    ///
    /// The only writer is the dispatch path, after a cacheable generic
    /// lookup at a megamorphic site — population is lazy, never pre-warmed.
    pub fn set(&mut self, class: HiddenClassRef, key: PropertyKey, handler: Handler) {
        let index = slot_index(&class, &key);
        let entry = &mut self.entries[index];
        if entry.is_occupied() && !entry.matches(&class, &key) {
            self.evictions += 1;
        }
        entry.class = Some(class);
        entry.key = key;
        entry.handler = handler;
        self.insertions += 1;
    }

    /// Reset every slot to empty.
    ///
    /// The bulk-invalidation hook: called when pointer identity itself is
    /// in doubt (compacting GC passes) or the class graph was rebuilt
    /// wholesale. Idempotent.
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = PropertyKeyEntry::empty();
        }
    }

    /// Check that every slot is empty. Diagnostics and tests only; not on
    /// the hot path.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.entries.iter().all(|e| !e.is_occupied())
    }

    /// Visit every occupied slot's class, key, and handler for GC root
    /// scanning.
    ///
    /// Correctness-critical: entries pin their classes, and this is where
    /// the collector learns about the pins. Skipping an occupied slot here
    /// would let a cached class be collected and its address recycled —
    /// the stale-pointer aliasing failure this design rules out.
    pub fn iterate(&self, tracer: &mut dyn Tracer) {
        for entry in self.entries.iter().filter(|e| e.is_occupied()) {
            if let Some(class) = &entry.class {
                tracer.trace_class(class);
            }
            tracer.trace_key(&entry.key);
            entry.handler.trace(tracer);
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|e| e.is_occupied()).count()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> MegaCacheStats {
        MegaCacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
            insertions: self.insertions,
            evictions: self.evictions,
        }
    }

}

impl Default for MegaIcCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MegaIcCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MegaIcCache")
            .field("length", &CACHE_LENGTH)
            .field("occupied", &self.occupied())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Counter snapshot for one cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MegaCacheStats {
    /// Probe hits.
    pub hits: u64,
    /// Probe misses (including evictions).
    pub misses: u64,
    /// Total insertions.
    pub insertions: u64,
    /// Insertions that displaced a different pair.
    pub evictions: u64,
}

impl MegaCacheStats {
    /// Hit rate over all probes.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let rate = self.hits as f64 / total as f64;
            rate
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

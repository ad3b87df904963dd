// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hashed string identifiers and the process-wide known-string table.
//!
//! A [`StrId`] is the CRC-64 of a name and is what gets persisted. Creating
//! one from text memoizes the hash and records the text in [`KnownStrings`],
//! a bounded LRU so that hashes read back from files can usually be shown as
//! text again. Hashes that were never seen in this process resolve to the
//! explicit [`Resolved::Unknown`] variant.
//!
//! Lookups use the read lock and `peek`, so display never reorders the LRU.
//! A secondary pin set keeps entries that must never be evicted (registered
//! type names, declared property names).

use crate::config::DEFAULT_KNOWN_STRINGS_CAPACITY;
use crate::hash::crc64_str;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::RwLock;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

static KNOWN_STRINGS: OnceLock<KnownStrings> = OnceLock::new();

/// Initialize the process-wide table with `capacity` (first call wins).
pub fn init_known_strings(capacity: usize) -> &'static KnownStrings {
    KNOWN_STRINGS.get_or_init(|| {
        log::debug!("[strid] known-string table initialized (capacity {})", capacity);
        KnownStrings::new(capacity)
    })
}

/// Process-wide table (initialized with the default capacity on first use).
pub fn known_strings() -> &'static KnownStrings {
    KNOWN_STRINGS
        .get()
        .unwrap_or_else(|| init_known_strings(DEFAULT_KNOWN_STRINGS_CAPACITY))
}

/// Hit/miss statistics of reverse lookups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
    pub collisions: u64,
}

/// Bounded reverse table from hash to original text.
pub struct KnownStrings {
    reverse: RwLock<LruCache<u64, Arc<str>>>,
    forward: DashMap<Arc<str>, u64>,
    pinned: DashMap<u64, Arc<str>>,
    stats: RwLock<LookupStats>,
}

impl KnownStrings {
    /// Table holding at most `capacity` unpinned entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            reverse: RwLock::new(LruCache::new(capacity)),
            forward: DashMap::new(),
            pinned: DashMap::new(),
            stats: RwLock::new(LookupStats::default()),
        }
    }

    /// Hash `text`, memoizing the result and recording it for reverse lookup.
    pub fn intern(&self, text: &str) -> u64 {
        if let Some(hash) = self.forward.get(text) {
            return *hash;
        }

        let hash = crc64_str(text);
        let text: Arc<str> = Arc::from(text);
        self.record(hash, &text);
        if self.forward.len() < self.capacity().saturating_mul(2) {
            self.forward.insert(text, hash);
        }
        hash
    }

    /// Intern `text` and protect it from eviction.
    pub fn pin(&self, text: &str) -> u64 {
        let hash = self.intern(text);
        if let Some(existing) = self.pinned.get(&hash) {
            if existing.as_ref() != text {
                self.note_collision(hash, &existing, text);
            }
            return hash;
        }
        self.pinned.insert(hash, Arc::from(text));
        hash
    }

    /// Original text of `hash`, if it was seen by this process and not evicted.
    pub fn lookup(&self, hash: u64) -> Option<Arc<str>> {
        let found = self
            .pinned
            .get(&hash)
            .map(|text| Arc::clone(&text))
            .or_else(|| self.reverse.read().peek(&hash).map(Arc::clone));

        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits = stats.hits.saturating_add(1);
        } else {
            stats.misses = stats.misses.saturating_add(1);
        }
        found
    }

    /// Number of unpinned entries currently held.
    pub fn len(&self) -> usize {
        self.reverse.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.pinned.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.reverse.read().cap().get()
    }

    /// Number of pinned entries.
    pub fn pinned_len(&self) -> usize {
        self.pinned.len()
    }

    #[must_use]
    pub fn stats(&self) -> LookupStats {
        *self.stats.read()
    }

    /// Evict least-recently recorded entries until at most `keep` remain.
    /// Pinned entries are unaffected.
    pub fn prune(&self, keep: usize) -> usize {
        let mut reverse = self.reverse.write();
        let mut evicted = 0;
        while reverse.len() > keep {
            match reverse.pop_lru() {
                Some((_, text)) => {
                    self.forward.remove(&text);
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            log::debug!("[strid] pruned {} known strings", evicted);
        }
        evicted
    }

    /// Drop every unpinned entry and the hash memo.
    pub fn clear(&self) {
        self.reverse.write().clear();
        self.forward.clear();
    }

    fn record(&self, hash: u64, text: &Arc<str>) {
        let mut reverse = self.reverse.write();
        if let Some(existing) = reverse.peek(&hash) {
            if existing.as_ref() != text.as_ref() {
                let existing = Arc::clone(existing);
                drop(reverse);
                self.note_collision(hash, &existing, text);
            }
            return;
        }
        if let Some((_, evicted)) = reverse.push(hash, Arc::clone(text)) {
            // push returns the evicted LRU entry (or the replaced one)
            if evicted.as_ref() != text.as_ref() {
                self.forward.remove(&evicted);
            }
        }
    }

    fn note_collision(&self, hash: u64, existing: &str, incoming: &str) {
        log::warn!(
            "[strid] hash collision on {:#018x}: keeping `{}`, ignoring `{}`",
            hash,
            existing,
            incoming
        );
        let mut stats = self.stats.write();
        stats.collisions = stats.collisions.saturating_add(1);
    }
}

impl fmt::Debug for KnownStrings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownStrings")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pinned", &self.pinned_len())
            .finish()
    }
}

/// Result of a reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Known(Arc<str>),
    Unknown(u64),
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Known(text) => f.write_str(text),
            Resolved::Unknown(hash) => write!(f, "<unknown {:#018x}>", hash),
        }
    }
}

/// 64-bit hashed identifier standing in for a name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StrId(u64);

impl StrId {
    /// The all-zero identifier (hash of the empty string).
    pub const NULL: StrId = StrId(0);

    /// Hash `text` and record it in the process-wide table.
    pub fn new(text: &str) -> Self {
        Self(known_strings().intern(text))
    }

    /// Hash `text` without touching the known-string table.
    pub const fn const_new(text: &str) -> Self {
        Self(crate::hash::crc64_const(text))
    }

    /// Identifier read from the wire; text is only known if seen elsewhere.
    pub const fn from_hash(hash: u64) -> Self {
        Self(hash)
    }

    pub const fn hash(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Original text, or the explicit unknown variant.
    pub fn resolve(self) -> Resolved {
        match known_strings().lookup(self.0) {
            Some(text) => Resolved::Known(text),
            None => Resolved::Unknown(self.0),
        }
    }

    /// Original text if known.
    pub fn text(self) -> Option<Arc<str>> {
        match self.resolve() {
            Resolved::Known(text) => Some(text),
            Resolved::Unknown(_) => None,
        }
    }
}

impl From<&str> for StrId {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<u64> for StrId {
    fn from(hash: u64) -> Self {
        Self::from_hash(hash)
    }
}

impl fmt::Display for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.resolve(), f)
    }
}

impl fmt::Debug for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Resolved::Known(text) => write!(f, "StrId({:#018x} {:?})", self.0, text),
            Resolved::Unknown(hash) => write!(f, "StrId({:#018x})", hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strid_hash_is_stable() {
        let a = StrId::new("CGameBlackboard");
        let b = StrId::new("CGameBlackboard");
        assert_eq!(a, b);
        assert_eq!(a.hash(), 0xDFD0_BBE2_7455_C408);
        assert_eq!(StrId::const_new("CGameBlackboard"), a);
    }

    #[test]
    fn test_strid_from_known_hash_resolves() {
        let id = StrId::new("strid_test_known_name");
        let read_back = StrId::from_hash(id.hash());
        assert_eq!(read_back.to_string(), "strid_test_known_name");
    }

    #[test]
    fn test_strid_unknown_hash_displays_explicitly() {
        let id = StrId::from_hash(0x0123_4567_89ab_cdef);
        assert_eq!(id.resolve(), Resolved::Unknown(0x0123_4567_89ab_cdef));
        assert_eq!(id.to_string(), "<unknown 0x0123456789abcdef>");
        assert!(id.text().is_none());
    }

    #[test]
    fn test_table_is_bounded_and_prunable() {
        let table = KnownStrings::new(4);
        for i in 0..10 {
            table.intern(&format!("name_{i}"));
        }
        assert_eq!(table.len(), 4);
        assert!(table.lookup(crc64_str("name_0")).is_none());
        assert!(table.lookup(crc64_str("name_9")).is_some());

        assert_eq!(table.prune(1), 3);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_pinned_entries_survive_eviction_and_clear() {
        let table = KnownStrings::new(2);
        let pinned = table.pin("Health");
        for i in 0..8 {
            table.intern(&format!("filler_{i}"));
        }
        table.clear();
        assert_eq!(table.lookup(pinned).as_deref(), Some("Health"));
        assert_eq!(table.pinned_len(), 1);
    }

    #[test]
    fn test_stats_count_hits_and_misses() {
        let table = KnownStrings::new(8);
        let hash = table.intern("Armor");
        assert!(table.lookup(hash).is_some());
        assert!(table.lookup(hash ^ 1).is_none());
        let stats = table.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}

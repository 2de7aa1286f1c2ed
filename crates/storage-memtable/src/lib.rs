//! # storage-memtable
//!
//! An in-memory, sorted, mutable write buffer for the storage engine's core.
//!
//! The memtable is the first point of contact for every write. It buffers
//! recent `put`/`delete` operations in a sorted structure (`BTreeMap`) before
//! they are flushed to an immutable on-disk SSTable.
//!
//! ## Key properties
//! - **Sorted order**: entries are always in ascending key order (required for SSTable flush).
//! - **Last-write-wins**: a later `put`/`delete` for the same key replaces the earlier entry in place.
//! - **Tombstone support**: deletes are recorded as `None` value markers, distinct from "absent".
//! - **Deterministic size accounting**: tracks the byte size of keys + values for flush threshold decisions.
//!
//! ## Example
//! ```rust
//! use storage_memtable::{Memtable, Lookup};
//! use storage_config::StorageConfig;
//!
//! let mut m = Memtable::new(StorageConfig::default());
//! m.put(b"hello".to_vec(), b"world".to_vec());
//! assert!(matches!(m.get(b"hello"), Lookup::Present(v) if v == b"world"));
//!
//! m.delete(b"hello".to_vec());
//! assert!(matches!(m.get(b"hello"), Lookup::Deleted));
//! ```

use std::collections::BTreeMap;

use storage_config::StorageConfig;

/// A single entry in the memtable: `Some(bytes)` for a live value, `None` for
/// a tombstone.
pub type Entry = Option<Vec<u8>>;

/// The value for a key, borrowed from the memtable's storage, as yielded by
/// [`Memtable::iterate_sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue<'a> {
    /// A live value.
    Value(&'a [u8]),
    /// A tombstone: the key was deleted.
    Tombstone,
}

/// The three-valued result of [`Memtable::get`].
///
/// `Deleted` is kept distinct from `Absent` on purpose: conflating the two
/// would cause a reader to descend past a tombstone into a stale value held
/// in an older SSTable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The key holds a live value.
    Present(&'a [u8]),
    /// The key was deleted; do not consult older layers.
    Deleted,
    /// The key has never been written in this memtable.
    Absent,
}

/// An ordered, in-memory write buffer backed by a `BTreeMap`.
///
/// Tracks an approximate-but-deterministic byte size (keys + values) so the
/// caller can decide when to flush to an SSTable via [`Memtable::is_full`].
#[derive(Debug)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Entry>,
    size_bytes: usize,
    config: StorageConfig,
}

impl Memtable {
    /// Creates a new, empty memtable governed by `config`.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            map: BTreeMap::new(),
            size_bytes: 0,
            config,
        }
    }

    /// Inserts a key-value pair, replacing any existing mapping (including a
    /// tombstone) for the same key.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.retire_existing(&key);
        self.size_bytes += key.len() + value.len();
        self.map.insert(key, Some(value));
    }

    /// Records a tombstone for `key`, replacing any existing mapping.
    ///
    /// The tombstone is retained (not simply removed) so it can shadow older
    /// values for the same key in SSTables once flushed.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.retire_existing(&key);
        self.size_bytes += key.len() + storage_config::TOMBSTONE_SIZE_COST;
        self.map.insert(key, None);
    }

    /// Removes `key`'s current accounted cost from `size_bytes`, if present,
    /// ahead of inserting its replacement.
    fn retire_existing(&mut self, key: &[u8]) {
        if let Some(existing) = self.map.get(key) {
            let old_cost = key.len()
                + existing
                    .as_ref()
                    .map_or(storage_config::TOMBSTONE_SIZE_COST, Vec::len);
            self.size_bytes = self.size_bytes.saturating_sub(old_cost);
        }
    }

    /// Looks up `key`. See [`Lookup`] for the three possible outcomes.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Lookup<'_> {
        match self.map.get(key) {
            Some(Some(value)) => Lookup::Present(value),
            Some(None) => Lookup::Deleted,
            None => Lookup::Absent,
        }
    }

    /// Cumulative accounted cost of all current entries (`len(key) +
    /// len(value)` for puts, `len(key) + TOMBSTONE_SIZE_COST` for
    /// tombstones). A pure function of insertion history.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// `true` once `size_bytes()` reaches the configured flush threshold.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size_bytes >= self.config.memtable_flush_threshold_bytes
    }

    /// Number of entries currently held, including tombstones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if the memtable holds zero entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Lazy, finite, restartable iterator over `(key, value-or-tombstone)` in
    /// ascending key order — the order an SSTable writer requires.
    pub fn iterate_sorted(&self) -> impl Iterator<Item = (&[u8], StoredValue<'_>)> + '_ {
        self.map.iter().map(|(k, v)| {
            let sv = match v {
                Some(value) => StoredValue::Value(value),
                None => StoredValue::Tombstone,
            };
            (k.as_slice(), sv)
        })
    }

    /// Resets the memtable to empty, reusing its existing allocation.
    pub fn clear(&mut self) {
        self.map.clear();
        self.size_bytes = 0;
    }
}

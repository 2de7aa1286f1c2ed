//! # storage-config
//!
//! Tunables shared by [`storage-wal`], [`storage-memtable`], and
//! [`storage-sstable`], collected in one place so the three crates agree on
//! caps and defaults instead of hard-coding their own copies.
//!
//! There is no CLI, environment variable, or file format at this boundary —
//! `StorageConfig` is always constructed in-process, by an enclosing store
//! that is itself out of scope here.

/// Default memtable flush threshold: 4 MiB.
pub const DEFAULT_FLUSH_THRESHOLD_BYTES: usize = 4 * 1024 * 1024;

/// Default number of data records per sparse SSTable index entry.
pub const DEFAULT_SSTABLE_INDEX_INTERVAL: usize = 16;

/// Default maximum key size in bytes.
pub const DEFAULT_MAX_KEY_BYTES: usize = 1024;

/// Default maximum value size in bytes.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 1024 * 1024;

/// Fixed cost (in bytes) a tombstone contributes to a memtable's accounted
/// size in place of a value length. Deliberately small and deterministic —
/// `Memtable::size_bytes` must be a pure function of insertion history.
pub const TOMBSTONE_SIZE_COST: usize = 8;

/// Shared configuration for the WAL, memtable, and SSTable layers.
///
/// Cloned cheaply and passed by value or shared reference; every field is a
/// plain size cap or threshold, never a path or handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Memtable byte-size threshold that triggers `is_full`.
    pub memtable_flush_threshold_bytes: usize,
    /// Number of data records per sparse SSTable index entry.
    pub sstable_index_interval: usize,
    /// Maximum accepted key size, in bytes.
    pub max_key_bytes: usize,
    /// Maximum accepted value size, in bytes.
    pub max_value_bytes: usize,
}

impl StorageConfig {
    /// Builds a config with every field set to its documented default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `memtable_flush_threshold_bytes` overridden.
    #[must_use]
    pub fn with_flush_threshold_bytes(mut self, bytes: usize) -> Self {
        self.memtable_flush_threshold_bytes = bytes;
        self
    }

    /// Returns a copy with `sstable_index_interval` overridden.
    ///
    /// The interval is baked into each SSTable file at write time; changing
    /// this field only affects files written after the change, never files
    /// already on disk (the reader infers block size from the index itself).
    #[must_use]
    pub fn with_sstable_index_interval(mut self, interval: usize) -> Self {
        assert!(interval > 0, "sstable_index_interval must be nonzero");
        self.sstable_index_interval = interval;
        self
    }

    /// Returns a copy with `max_key_bytes` overridden.
    #[must_use]
    pub fn with_max_key_bytes(mut self, bytes: usize) -> Self {
        self.max_key_bytes = bytes;
        self
    }

    /// Returns a copy with `max_value_bytes` overridden.
    #[must_use]
    pub fn with_max_value_bytes(mut self, bytes: usize) -> Self {
        self.max_value_bytes = bytes;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memtable_flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD_BYTES,
            sstable_index_interval: DEFAULT_SSTABLE_INDEX_INTERVAL,
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests;

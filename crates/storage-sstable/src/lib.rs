//! # storage-sstable — Sorted String Table
//!
//! Immutable, on-disk storage files for the storage engine's core. When the
//! in-memory [`storage_memtable::Memtable`] is full, its sorted contents are
//! streamed into a new SSTable; once finalized, the file is write-once,
//! read-many.
//!
//! ## File layout
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ HEADER (24 B)                                               │
//! │ magic (u64) | version (u32) | num_entries (u64) | reserved  │
//! ├────────────────────────────────────────────────────────────┤
//! │ DATA (N records, ascending key)                              │
//! │ key_size (u32) | value_size (u32) | key | value              │
//! │ value_size == 0xFFFFFFFF marks a tombstone (no value bytes)  │
//! ├────────────────────────────────────────────────────────────┤
//! │ SPARSE INDEX (one entry per `sstable_index_interval` records) │
//! │ key_size (u32) | key | data_offset (u64)                     │
//! ├────────────────────────────────────────────────────────────┤
//! │ FOOTER (16 B)                                                 │
//! │ index_offset (u64) | crc32 (u64, zero-extended)               │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. The footer CRC-32 covers every byte of
//! the file preceding it (header, with the final entry count, plus data plus
//! index).

mod error;
mod format;
mod reader;
mod writer;

pub use error::SstableError;
pub use format::{HEADER_BYTES, FOOTER_BYTES, MAGIC, VERSION};
pub use reader::{Lookup, RangeIter, SstableReader, StoredValue};
pub use writer::{write_from_memtable, SstableWriter};

#[cfg(test)]
#[path = "tests/roundtrip_tests.rs"]
mod roundtrip_tests;

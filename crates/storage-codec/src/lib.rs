//! # storage-codec
//!
//! The binary building block shared by [`storage-wal`] and [`storage-sstable`]:
//! fixed-width little-endian integer pack/unpack plus CRC-32 over byte ranges.
//!
//! This crate holds no state and performs no allocation beyond what callers
//! hand it. Every multi-byte integer on disk in this codebase is unsigned,
//! little-endian, and fixed width (`u32` for sizes, `u64` for timestamps and
//! offsets, `u32` for checksums) — the helpers here are the single place that
//! fact is encoded, so the WAL and SSTable formats can't drift from each other.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

/// Writes a `u32` to `w` in little-endian byte order.
pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_u32::<LittleEndian>(v)
}

/// Writes a `u64` to `w` in little-endian byte order.
pub fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_u64::<LittleEndian>(v)
}

/// Reads a `u32` from `r` in little-endian byte order.
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    r.read_u32::<LittleEndian>()
}

/// Reads a `u64` from `r` in little-endian byte order.
pub fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    r.read_u64::<LittleEndian>()
}

/// Computes the CRC-32 (IEEE 802.3 polynomial, reflected) of `bytes` in one shot.
#[must_use]
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// A streaming CRC-32 accumulator for callers that checksum a record or file
/// incrementally instead of from a single contiguous slice (e.g. the SSTable
/// footer CRC, which covers header + data + index as they are written).
#[derive(Default)]
pub struct CrcAccumulator(Hasher);

impl CrcAccumulator {
    /// Creates a fresh accumulator with no bytes consumed.
    #[must_use]
    pub fn new() -> Self {
        Self(Hasher::new())
    }

    /// Feeds more bytes into the running checksum.
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    /// Consumes the accumulator and returns the final CRC-32 value.
    #[must_use]
    pub fn finalize(self) -> u32 {
        self.0.finalize()
    }
}

/// Sentinel `value_size` marking a tombstone in both the WAL and SSTable
/// on-disk record formats. Any value this large would blow the documented
/// value size cap, so it is unambiguous as a distinguished "absent" marker.
pub const TOMBSTONE_SENTINEL: u32 = 0xFFFF_FFFF;

#[cfg(test)]
mod tests;

//! Streaming SSTable writer.
//!
//! Callers add records in strictly ascending key order, then finalize: the
//! writer builds the sparse index as it goes, rewrites the header with the
//! final entry count, computes the whole-file CRC, appends the footer, and
//! atomically renames the temporary file into its final path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use storage_codec::{write_u32, write_u64, CrcAccumulator, TOMBSTONE_SENTINEL};
use storage_config::StorageConfig;
use storage_memtable::{Memtable, StoredValue as MemStoredValue};

use crate::error::SstableError;
use crate::format;

/// Chunk size used when re-reading the file to compute the footer CRC.
const CRC_CHUNK_BYTES: usize = 64 * 1024;

/// Produces a single immutable, self-describing, CRC-protected SSTable file.
///
/// State machine: `Writing` (the only state right after [`create`][Self::create])
/// -> `Finalized` (terminal, set by a successful [`finalize`][Self::finalize]).
/// `add` and a second `finalize` both fail with [`SstableError::Invariant`]
/// once the writer is finalized.
pub struct SstableWriter {
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: File,
    config: StorageConfig,
    index: Vec<(Vec<u8>, u64)>,
    last_key: Option<Vec<u8>>,
    count: u64,
    finalized: bool,
}

impl SstableWriter {
    /// Creates a writer targeting `path`. Writes go to a sibling temporary
    /// file (`path` with an added `.tmp` extension) so a crash mid-write
    /// never leaves a partially valid file at the canonical name; the
    /// temporary file is renamed into place on a successful `finalize`.
    pub fn create<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self, SstableError> {
        let final_path = path.as_ref().to_path_buf();
        let mut tmp_name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = final_path.with_file_name(tmp_name);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .read(true)
            .truncate(true)
            .open(&tmp_path)?;

        // Placeholder header; rewritten with the real count at finalize.
        format::write_header(&mut file, 0)?;

        Ok(Self {
            tmp_path,
            final_path,
            file,
            config,
            index: Vec::new(),
            last_key: None,
            count: 0,
            finalized: false,
        })
    }

    /// Appends one record. `value = None` writes a tombstone.
    ///
    /// Must be called in strictly ascending key order; an out-of-order or
    /// repeated key fails with [`SstableError::Invariant`], as does an
    /// oversize key/value or a call after `finalize`.
    pub fn add(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(), SstableError> {
        if self.finalized {
            return Err(SstableError::Invariant(
                "add() called on a finalized writer".into(),
            ));
        }
        if key.is_empty() || key.len() > self.config.max_key_bytes {
            return Err(SstableError::Invariant(format!(
                "key size {} outside [1, {}]",
                key.len(),
                self.config.max_key_bytes
            )));
        }
        if let Some(v) = value {
            if v.len() > self.config.max_value_bytes {
                return Err(SstableError::Invariant(format!(
                    "value too large: {} bytes (max {})",
                    v.len(),
                    self.config.max_value_bytes
                )));
            }
        }
        if let Some(last) = &self.last_key {
            if key <= last.as_slice() {
                return Err(SstableError::Invariant(format!(
                    "add() called out of order: {key:?} did not follow {last:?}"
                )));
            }
        }

        let offset = self.file.stream_position()?;
        if self.count as usize % self.config.sstable_index_interval == 0 {
            self.index.push((key.to_vec(), offset));
        }

        match value {
            Some(v) => {
                write_u32(&mut self.file, key.len() as u32)?;
                write_u32(&mut self.file, v.len() as u32)?;
                self.file.write_all(key)?;
                self.file.write_all(v)?;
            }
            None => {
                write_u32(&mut self.file, key.len() as u32)?;
                write_u32(&mut self.file, TOMBSTONE_SENTINEL)?;
                self.file.write_all(key)?;
            }
        }

        self.last_key = Some(key.to_vec());
        self.count += 1;
        Ok(())
    }

    /// Writes the sparse index, rewrites the header with the final entry
    /// count, computes the whole-file CRC, appends the footer, fsyncs, and
    /// atomically renames the temporary file into its final path.
    ///
    /// A writer with zero `add` calls still produces a valid (empty) file.
    /// Calling `finalize` a second time fails with [`SstableError::Invariant`]
    /// and leaves the already-published file untouched.
    pub fn finalize(&mut self) -> Result<(), SstableError> {
        if self.finalized {
            return Err(SstableError::Invariant(
                "finalize() called on an already-finalized writer".into(),
            ));
        }

        let index_offset = self.file.stream_position()?;
        for (key, data_offset) in &self.index {
            write_u32(&mut self.file, key.len() as u32)?;
            self.file.write_all(key)?;
            write_u64(&mut self.file, *data_offset)?;
        }
        let index_end = self.file.stream_position()?;

        self.file.seek(SeekFrom::Start(0))?;
        format::write_header(&mut self.file, self.count)?;

        let crc = self.crc_over_prefix(index_end)?;

        self.file.seek(SeekFrom::Start(index_end))?;
        format::write_footer(&mut self.file, index_offset, crc)?;

        self.file.flush()?;
        self.file.sync_all()?;

        fs::rename(&self.tmp_path, &self.final_path)?;
        if let Some(parent) = self.final_path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        self.finalized = true;
        tracing::debug!(
            target: "storage_sstable",
            path = %self.final_path.display(),
            entries = self.count,
            "sstable finalized"
        );
        Ok(())
    }

    /// Streams the file's first `len` bytes back through a CRC accumulator.
    /// Used once at finalize, after the header has been rewritten with the
    /// real entry count, so the checksum covers exactly the bytes a reader
    /// will later validate.
    fn crc_over_prefix(&mut self, len: u64) -> io::Result<u32> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut acc = CrcAccumulator::new();
        let mut remaining = len;
        let mut buf = [0u8; CRC_CHUNK_BYTES];
        while remaining > 0 {
            let to_read = remaining.min(buf.len() as u64) as usize;
            self.file.read_exact(&mut buf[..to_read])?;
            acc.update(&buf[..to_read]);
            remaining -= to_read as u64;
        }
        Ok(acc.finalize())
    }
}

/// Flushes an entire memtable to a new SSTable at `path`.
///
/// Convenience wrapper around [`SstableWriter`] for the common case where
/// the caller already has a fully-populated, sorted [`Memtable`] to drain.
pub fn write_from_memtable(
    path: &Path,
    mem: &Memtable,
    config: StorageConfig,
) -> Result<(), SstableError> {
    let mut writer = SstableWriter::create(path, config)?;
    for (key, value) in mem.iterate_sorted() {
        let value = match value {
            MemStoredValue::Value(v) => Some(v),
            MemStoredValue::Tombstone => None,
        };
        writer.add(key, value)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;

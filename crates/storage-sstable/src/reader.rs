//! SSTable reader: validates a finalized file and serves point lookups,
//! bounded range scans, and full iteration.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use storage_codec::{read_u32, read_u64, CrcAccumulator, TOMBSTONE_SENTINEL};
use storage_config::StorageConfig;

use crate::error::SstableError;
use crate::format::{self, FOOTER_BYTES, HEADER_BYTES};

/// Chunk size used when re-reading the file to validate the footer CRC.
const CRC_CHUNK_BYTES: usize = 64 * 1024;

/// The value stored for a key, as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    /// A live value.
    Value(Vec<u8>),
    /// A tombstone: the key was deleted.
    Tombstone,
}

/// The three-valued result of [`SstableReader::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The key holds a live value in this SSTable.
    Present(Vec<u8>),
    /// The key was deleted in this SSTable.
    Deleted,
    /// This SSTable has no record for the key.
    Absent,
}

/// Opens a finalized SSTable file for point lookups, range scans, and
/// iteration. Multiple readers may safely open the same file concurrently —
/// a finalized SSTable is immutable.
pub struct SstableReader {
    path: PathBuf,
    index: Vec<(Vec<u8>, u64)>,
    index_offset: u64,
    num_entries: u64,
    config: StorageConfig,
    file: Mutex<File>,
}

impl SstableReader {
    /// Opens `path`, validating the footer CRC, header magic/version, and
    /// loading the sparse index into memory.
    ///
    /// Fails with [`SstableError::Corruption`] on a footer CRC mismatch, bad
    /// magic, unknown version, or an index entry whose declared key size
    /// overruns the index region.
    pub fn open<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self, SstableError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_BYTES + FOOTER_BYTES {
            return Err(SstableError::Corruption(
                "file too small for header + footer".into(),
            ));
        }

        let (index_offset, stored_crc) = format::read_footer(&mut file, file_len)?;
        if index_offset > file_len - FOOTER_BYTES {
            return Err(SstableError::Corruption(
                "index_offset points past the footer".into(),
            ));
        }

        let actual_crc = Self::crc_over_prefix(&mut file, file_len - FOOTER_BYTES)?;
        if actual_crc != stored_crc {
            tracing::warn!(target: "storage_sstable", path = %path.display(), "sstable footer crc mismatch");
            return Err(SstableError::Corruption(format!(
                "footer crc mismatch: expected {stored_crc:#010x}, got {actual_crc:#010x}"
            )));
        }

        file.seek(SeekFrom::Start(0))?;
        let header = match format::read_header(&mut file)? {
            Ok(h) => h,
            Err(msg) => return Err(SstableError::Corruption(msg)),
        };

        file.seek(SeekFrom::Start(index_offset))?;
        let mut index = Vec::new();
        let index_region_end = file_len - FOOTER_BYTES;
        while file.stream_position()? < index_region_end {
            let key_size = read_u32(&mut file)?;
            if key_size as usize > config.max_key_bytes {
                return Err(SstableError::Corruption(format!(
                    "index key_size {key_size} exceeds cap"
                )));
            }
            let mut key = vec![0u8; key_size as usize];
            file.read_exact(&mut key)?;
            let data_offset = read_u64(&mut file)?;
            index.push((key, data_offset));
        }

        tracing::debug!(
            target: "storage_sstable",
            path = %path.display(),
            entries = header.num_entries,
            index_len = index.len(),
            "sstable opened"
        );

        Ok(Self {
            path,
            index,
            index_offset,
            num_entries: header.num_entries,
            config,
            file: Mutex::new(file),
        })
    }

    fn crc_over_prefix(file: &mut File, len: u64) -> Result<u32, SstableError> {
        file.seek(SeekFrom::Start(0))?;
        let mut acc = CrcAccumulator::new();
        let mut remaining = len;
        let mut buf = [0u8; CRC_CHUNK_BYTES];
        while remaining > 0 {
            let to_read = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..to_read])?;
            acc.update(&buf[..to_read]);
            remaining -= to_read as u64;
        }
        Ok(acc.finalize())
    }

    /// Returns the offset to start a forward scan from for `target`: the
    /// greatest sparse-index entry with key <= `target`, or the start of the
    /// data region (right after the header) if none qualifies.
    fn scan_start(&self, target: &[u8]) -> u64 {
        let pos = self
            .index
            .partition_point(|(k, _)| k.as_slice() <= target);
        if pos == 0 {
            HEADER_BYTES
        } else {
            self.index[pos - 1].1
        }
    }

    /// Reads one data record at `offset`, returning `(key, value, next_offset)`.
    fn read_record_at(
        &self,
        file: &mut File,
        offset: u64,
    ) -> Result<(Vec<u8>, StoredValue, u64), SstableError> {
        file.seek(SeekFrom::Start(offset))?;
        let key_size = read_u32(file)?;
        let value_size = read_u32(file)?;
        if key_size as usize > self.config.max_key_bytes {
            return Err(SstableError::Corruption(format!(
                "data key_size {key_size} exceeds cap"
            )));
        }
        let mut key = vec![0u8; key_size as usize];
        file.read_exact(&mut key)?;

        let value = if value_size == TOMBSTONE_SENTINEL {
            StoredValue::Tombstone
        } else {
            if value_size as usize > self.config.max_value_bytes {
                return Err(SstableError::Corruption(format!(
                    "data value_size {value_size} exceeds cap"
                )));
            }
            let mut val = vec![0u8; value_size as usize];
            file.read_exact(&mut val)?;
            StoredValue::Value(val)
        };

        let next_offset = file.stream_position()?;
        Ok((key, value, next_offset))
    }

    /// Point lookup. Scans forward from the sparse index's floor entry,
    /// bounded by `sstable_index_interval` records because the next index
    /// entry's key is strictly greater than any key in the current block.
    pub fn get(&self, key: &[u8]) -> Result<Lookup, SstableError> {
        let mut offset = self.scan_start(key);
        let mut file = self
            .file
            .lock()
            .map_err(|_| SstableError::Io(std::io::Error::other("sstable file lock poisoned")))?;

        while offset < self.index_offset {
            let (rec_key, value, next_offset) = self.read_record_at(&mut file, offset)?;
            match rec_key.as_slice().cmp(key) {
                std::cmp::Ordering::Equal => {
                    return Ok(match value {
                        StoredValue::Value(v) => Lookup::Present(v),
                        StoredValue::Tombstone => Lookup::Deleted,
                    });
                }
                std::cmp::Ordering::Greater => return Ok(Lookup::Absent),
                std::cmp::Ordering::Less => {
                    offset = next_offset;
                }
            }
        }
        Ok(Lookup::Absent)
    }

    /// Lazy, finite range scan: inclusive `lo`, exclusive `hi`. Emits
    /// tombstones as-is so the caller can reconcile with younger layers.
    #[must_use]
    pub fn range<'a>(&'a self, lo: &[u8], hi: &'a [u8]) -> RangeIter<'a> {
        RangeIter {
            reader: self,
            offset: self.scan_start(lo),
            hi: Some(hi.to_vec()),
            done: false,
        }
    }

    /// Lazy, finite iterator over every record in the file, in ascending key
    /// order.
    #[must_use]
    pub fn iterate_all(&self) -> RangeIter<'_> {
        RangeIter {
            reader: self,
            offset: HEADER_BYTES,
            hi: None,
            done: false,
        }
    }

    /// Number of data records in this SSTable, from the header.
    #[must_use]
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Path this reader was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the file handle. Equivalent to dropping the reader.
    pub fn close(self) {}
}

/// Iterator returned by [`SstableReader::range`] and [`SstableReader::iterate_all`].
pub struct RangeIter<'a> {
    reader: &'a SstableReader,
    offset: u64,
    hi: Option<Vec<u8>>,
    done: bool,
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = Result<(Vec<u8>, StoredValue), SstableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.reader.index_offset {
            return None;
        }

        let mut file = match self.reader.file.lock() {
            Ok(f) => f,
            Err(_) => {
                self.done = true;
                return Some(Err(SstableError::Io(std::io::Error::other(
                    "sstable file lock poisoned",
                ))));
            }
        };

        let (key, value, next_offset) = match self.reader.read_record_at(&mut file, self.offset) {
            Ok(v) => v,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        drop(file);

        if let Some(hi) = &self.hi {
            if key.as_slice() >= hi.as_slice() {
                self.done = true;
                return None;
            }
        }

        self.offset = next_offset;
        Some(Ok((key, value)))
    }
}

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod tests;

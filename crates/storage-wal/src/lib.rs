//! # storage-wal — Write-Ahead Log
//!
//! Durability for the storage engine's core: every mutation (`PUT` or
//! `DELETE`) is serialized into a binary record and appended to the WAL
//! **before** the corresponding in-memory update. On restart the WAL is
//! replayed to reconstruct the memtable, guaranteeing that no acknowledged
//! write is lost.
//!
//! ## Binary record format
//!
//! ```text
//! [timestamp: u64 LE][key_size: u32 LE][value_size: u32 LE][key][value?][crc32: u32 LE]
//! ```
//!
//! `value_size` uses the sentinel [`storage_codec::TOMBSTONE_SENTINEL`] to
//! mark a delete; no value bytes follow in that case. The trailing `crc32`
//! covers every byte of the record that precedes it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use storage_wal::{WalWriter, WalReader};
//! use storage_config::StorageConfig;
//!
//! let mut w = WalWriter::create("wal.log", StorageConfig::default()).unwrap();
//! w.append(b"hello", Some(b"world")).unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("wal.log", StorageConfig::default()).unwrap();
//! for record in r.iter() {
//!     println!("{:?}", record.unwrap());
//! }
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use storage_codec::{crc32, read_u32, read_u64, write_u32, write_u64, TOMBSTONE_SENTINEL};
use storage_config::StorageConfig;
use thiserror::Error;

/// Fixed width of the header preceding key/value bytes: timestamp + key_size + value_size.
const RECORD_HEADER_BYTES: usize = 8 + 4 + 4;

/// A single decoded WAL record: a key-value insertion or a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A key-value insertion.
    Put {
        /// Monotonically nondecreasing microsecond timestamp assigned at append time.
        timestamp: u64,
        /// The lookup key.
        key: Vec<u8>,
        /// The payload value.
        value: Vec<u8>,
    },
    /// A key deletion (tombstone).
    Delete {
        /// Monotonically nondecreasing microsecond timestamp assigned at append time.
        timestamp: u64,
        /// The key to delete.
        key: Vec<u8>,
    },
}

impl WalRecord {
    /// The key this record mutates, regardless of variant.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            WalRecord::Put { key, .. } | WalRecord::Delete { key, .. } => key,
        }
    }

    /// The timestamp this record was appended with.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        match self {
            WalRecord::Put { timestamp, .. } | WalRecord::Delete { timestamp, .. } => *timestamp,
        }
    }
}

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error (failed read/write/fsync).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A non-tail record failed CRC validation, or declared sizes exceed the
    /// configured caps. A truncated *tail* record is never reported this way
    /// — see [`WalReader::iter`].
    #[error("corrupt WAL record: {0}")]
    Corruption(String),

    /// Caller misuse: an oversize key/value was passed to `append`.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Append-only WAL writer.
///
/// Exclusively owns its file handle for the duration of its life. Every
/// `append` flushes and `fsync`s before returning, so a successful call means
/// the record (and everything appended before it) is durable on stable
/// storage.
pub struct WalWriter {
    file: File,
    config: StorageConfig,
    last_timestamp: u64,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    ///
    /// If the file already contains records, scans it once to seed the
    /// internal clock so that newly appended timestamps stay nondecreasing
    /// across process restarts.
    pub fn create<P: AsRef<Path>>(path: P, config: StorageConfig) -> Result<Self, WalError> {
        let path = path.as_ref();
        let last_timestamp = match WalReader::open(path, config) {
            Ok(mut reader) => {
                let mut max_ts = 0u64;
                for record in reader.iter() {
                    max_ts = max_ts.max(record?.timestamp());
                }
                max_ts
            }
            Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        tracing::debug!(target: "storage_wal", path = %path.display(), last_timestamp, "wal opened");

        Ok(Self {
            file,
            config,
            last_timestamp,
            buf: Vec::with_capacity(256),
        })
    }

    /// Appends a mutation record (`value = Some(_)` for a put, `None` for a
    /// tombstone), flushing and `fsync`ing before returning.
    ///
    /// Fails with [`WalError::Invariant`] if the key is empty or either the
    /// key or value exceeds the configured caps. Fails with [`WalError::Io`]
    /// on any underlying write/fsync failure — at that point the caller must
    /// assume the record may or may not be on disk, and reconcile via
    /// recovery rather than retrying blindly.
    pub fn append(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(), WalError> {
        if key.is_empty() {
            return Err(WalError::Invariant("key must not be empty".into()));
        }
        if key.len() > self.config.max_key_bytes {
            return Err(WalError::Invariant(format!(
                "key too large: {} bytes (max {})",
                key.len(),
                self.config.max_key_bytes
            )));
        }
        if let Some(v) = value {
            if v.len() > self.config.max_value_bytes {
                return Err(WalError::Invariant(format!(
                    "value too large: {} bytes (max {})",
                    v.len(),
                    self.config.max_value_bytes
                )));
            }
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let timestamp = (self.last_timestamp + 1).max(now);

        self.buf.clear();
        write_u64(&mut self.buf, timestamp)?;
        write_u32(&mut self.buf, key.len() as u32)?;
        match value {
            Some(v) => {
                write_u32(&mut self.buf, v.len() as u32)?;
                self.buf.extend_from_slice(key);
                self.buf.extend_from_slice(v);
            }
            None => {
                write_u32(&mut self.buf, TOMBSTONE_SENTINEL)?;
                self.buf.extend_from_slice(key);
            }
        }

        let crc = crc32(&self.buf);
        write_u32(&mut self.buf, crc)?;

        self.file.write_all(&self.buf)?;
        self.file.flush()?;
        self.file.sync_all()?;

        self.last_timestamp = timestamp;
        tracing::trace!(target: "storage_wal", timestamp, key_len = key.len(), "wal append");

        Ok(())
    }

    /// Truncates the WAL to zero length and `fsync`s. A no-op on an
    /// already-empty WAL. Called after a successful SSTable flush.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        tracing::debug!(target: "storage_wal", "wal truncated");
        Ok(())
    }

    /// Current on-disk length of the WAL file.
    pub fn size_bytes(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Releases the file handle. Equivalent to dropping the writer.
    pub fn close(self) {}
}

/// Sequential WAL reader that yields decoded records.
///
/// Generic over any `Read` implementor so tests can replay from an in-memory
/// buffer as well as a real file.
pub struct WalReader<R> {
    rdr: BufReader<R>,
    config: StorageConfig,
}

impl WalReader<File> {
    /// Opens an existing WAL file for sequential iteration.
    ///
    /// `config` supplies the `max_key_bytes`/`max_value_bytes` caps the
    /// iterator validates each record's declared sizes against before
    /// allocating its body buffer.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: StorageConfig,
    ) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
            config,
        })
    }
}

impl<R: Read> WalReader<R> {
    /// Constructs a reader from any `Read` implementor.
    pub fn from_reader(reader: R, config: StorageConfig) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
            config,
        }
    }

    /// Returns a lazy, finite iterator over the records still to be read.
    ///
    /// ## Termination
    ///
    /// - Clean EOF (no more bytes) -> the iterator ends.
    /// - A truncated tail (a partial record, the expected crash signature) ->
    ///   the iterator ends cleanly *before* the partial record; no error is
    ///   raised.
    /// - A CRC mismatch on a *complete* record (corruption in the middle of
    ///   the log) -> the iterator yields one `Err(WalError::Corruption)` and
    ///   then ends.
    /// - A declared `key_size`/`value_size` that violates the configured
    ///   caps (spec §7: "key caps violated on read") -> the iterator yields
    ///   one `Err(WalError::Corruption)` and then ends.
    /// - Any I/O error -> the iterator yields one `Err(WalError::Io)` and then
    ///   ends.
    pub fn iter(&mut self) -> WalRecordIter<'_, R> {
        WalRecordIter {
            rdr: &mut self.rdr,
            config: self.config,
            done: false,
            body: Vec::with_capacity(256),
        }
    }
}

/// Iterator returned by [`WalReader::iter`]. See its documentation for
/// termination semantics.
pub struct WalRecordIter<'a, R> {
    rdr: &'a mut BufReader<R>,
    config: StorageConfig,
    done: bool,
    body: Vec<u8>,
}

impl<'a, R: Read> Iterator for WalRecordIter<'a, R> {
    type Item = Result<WalRecord, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let timestamp = match read_u64(self.rdr) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::Io(e)));
            }
        };

        let key_size = match read_u32(self.rdr) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::Io(e)));
            }
        };

        let value_size = match read_u32(self.rdr) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::Io(e)));
            }
        };

        let is_tombstone = value_size == storage_codec::TOMBSTONE_SENTINEL;
        let value_len = if is_tombstone { 0 } else { value_size as usize };

        // Validate declared sizes against the configured caps before
        // allocating a body buffer — a corrupt header could otherwise claim
        // gigabytes, and a record honoring a different (looser) config than
        // the one this reader was opened with must be rejected as corrupt
        // rather than silently replayed.
        if key_size == 0 || key_size as usize > self.config.max_key_bytes {
            self.done = true;
            return Some(Err(WalError::Corruption(format!(
                "key_size {key_size} outside [1, {}]",
                self.config.max_key_bytes
            ))));
        }
        if !is_tombstone && value_len > self.config.max_value_bytes {
            self.done = true;
            return Some(Err(WalError::Corruption(format!(
                "value_size {value_len} exceeds cap {}",
                self.config.max_value_bytes
            ))));
        }

        self.body.clear();
        self.body.reserve(key_size as usize + value_len);
        self.body.resize(key_size as usize + value_len, 0);
        match self.rdr.read_exact(&mut self.body) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::Io(e)));
            }
        }

        let stored_crc = match read_u32(self.rdr) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // Body was complete but the CRC trailer is missing/partial:
                // still a truncated tail, not corruption.
                self.done = true;
                return None;
            }
            Err(e) => {
                self.done = true;
                return Some(Err(WalError::Io(e)));
            }
        };

        let mut prefix = Vec::with_capacity(RECORD_HEADER_BYTES + self.body.len());
        prefix.extend_from_slice(&timestamp.to_le_bytes());
        prefix.extend_from_slice(&key_size.to_le_bytes());
        prefix.extend_from_slice(&value_size.to_le_bytes());
        prefix.extend_from_slice(&self.body);
        let computed_crc = crc32(&prefix);

        if computed_crc != stored_crc {
            self.done = true;
            return Some(Err(WalError::Corruption(format!(
                "crc mismatch at timestamp {timestamp}: expected {stored_crc:#010x}, got {computed_crc:#010x}"
            ))));
        }

        let key = self.body[..key_size as usize].to_vec();
        let record = if is_tombstone {
            WalRecord::Delete { timestamp, key }
        } else {
            let value = self.body[key_size as usize..].to_vec();
            WalRecord::Put {
                timestamp,
                key,
                value,
            }
        };

        Some(Ok(record))
    }
}

#[cfg(test)]
mod tests;

//! SSTable binary format constants and header/footer read/write helpers.
//!
//! ```text
//! [ Header  24 B ] magic(8) | version(4) | num_entries(8) | reserved(4)
//! [ Data region: N records, ascending key ]
//! [ Sparse index: ceil(N / INDEX_INTERVAL) entries ]
//! [ Footer  16 B ] index_offset(8) | crc32(8, zero-extended)
//! ```
//!
//! The magic is the ASCII bytes of `"SSTABBLE"` read as one little-endian
//! `u64`. The footer's CRC-32 is stored zero-extended into the low 4 bytes of
//! an 8-byte field; readers mask off the high bytes rather than assume they
//! are meaningful, tolerating either convention.

use std::io::{self, Read, Seek, SeekFrom, Write};

use storage_codec::{read_u32, read_u64, write_u32, write_u64};

/// Magic number identifying this SSTable format: ASCII `"SSTABBLE"`.
pub const MAGIC: u64 = 0x5353_5441_4242_4C45;

/// Current on-disk format version.
pub const VERSION: u32 = 1;

/// Size of the fixed header, in bytes.
pub const HEADER_BYTES: u64 = 24;

/// Size of the fixed footer, in bytes.
pub const FOOTER_BYTES: u64 = 16;

/// Parsed SSTable header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// On-disk format version.
    pub version: u32,
    /// Number of data records in the file.
    pub num_entries: u64,
}

/// Writes the 24-byte header: `magic | version | num_entries | reserved`.
pub fn write_header<W: Write>(w: &mut W, num_entries: u64) -> io::Result<()> {
    write_u64(w, MAGIC)?;
    write_u32(w, VERSION)?;
    write_u64(w, num_entries)?;
    write_u32(w, 0)?; // reserved
    Ok(())
}

/// Reads and validates the header at the current position.
///
/// Returns `Err` with a description if the magic doesn't match or the
/// version is unrecognized; the caller wraps this into its own error kind.
pub fn read_header<R: Read>(r: &mut R) -> io::Result<Result<Header, String>> {
    let magic = read_u64(r)?;
    let version = read_u32(r)?;
    let num_entries = read_u64(r)?;
    let _reserved = read_u32(r)?;

    if magic != MAGIC {
        return Ok(Err(format!("bad magic: {magic:#018x}")));
    }
    if version != VERSION {
        return Ok(Err(format!("unknown version: {version}")));
    }
    Ok(Ok(Header {
        version,
        num_entries,
    }))
}

/// Writes the 16-byte footer: `index_offset | crc32 (zero-extended to u64)`.
pub fn write_footer<W: Write>(w: &mut W, index_offset: u64, crc: u32) -> io::Result<()> {
    write_u64(w, index_offset)?;
    write_u64(w, u64::from(crc))?;
    Ok(())
}

/// Reads the footer from the last [`FOOTER_BYTES`] of a seekable reader,
/// returning `(index_offset, crc32)`. Leaves the cursor at EOF.
pub fn read_footer<R: Read + Seek>(r: &mut R, file_len: u64) -> io::Result<(u64, u32)> {
    r.seek(SeekFrom::Start(file_len - FOOTER_BYTES))?;
    let index_offset = read_u64(r)?;
    let crc_field = read_u64(r)?;
    // Zero-extended CRC-32: mask off the high bytes rather than trust them.
    let crc = (crc_field & 0xFFFF_FFFF) as u32;
    Ok((index_offset, crc))
}

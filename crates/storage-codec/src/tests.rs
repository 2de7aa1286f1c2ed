use super::*;
use std::io::Cursor;

#[test]
fn round_trips_u32() {
    let mut buf = Vec::new();
    write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
    let mut cur = Cursor::new(buf);
    assert_eq!(read_u32(&mut cur).unwrap(), 0xDEAD_BEEF);
}

#[test]
fn round_trips_u64() {
    let mut buf = Vec::new();
    write_u64(&mut buf, 0x0102_0304_0506_0708).unwrap();
    let mut cur = Cursor::new(buf);
    assert_eq!(read_u64(&mut cur).unwrap(), 0x0102_0304_0506_0708);
}

#[test]
fn u32_is_little_endian_on_disk() {
    let mut buf = Vec::new();
    write_u32(&mut buf, 1).unwrap();
    assert_eq!(buf, vec![1, 0, 0, 0]);
}

#[test]
fn crc32_matches_accumulator_over_same_bytes() {
    let data = b"the quick brown fox jumps over the lazy dog";
    let one_shot = crc32(data);

    let mut acc = CrcAccumulator::new();
    acc.update(&data[..10]);
    acc.update(&data[10..]);
    assert_eq!(acc.finalize(), one_shot);
}

#[test]
fn crc32_detects_single_byte_flip() {
    let mut data = b"sstable payload bytes".to_vec();
    let original = crc32(&data);
    data[3] ^= 0x01;
    assert_ne!(crc32(&data), original);
}

#[test]
fn tombstone_sentinel_exceeds_max_value_size() {
    // The sentinel must never collide with a legitimate value_size.
    assert!(TOMBSTONE_SENTINEL as usize > 1_048_576);
}

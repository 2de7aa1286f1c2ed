use super::*;
use std::io::Cursor;
use storage_config::StorageConfig;
use tempfile::tempdir;

fn replay_all(path: &Path) -> Result<Vec<WalRecord>, WalError> {
    replay_all_with_config(path, StorageConfig::default())
}

fn replay_all_with_config(
    path: &Path,
    config: StorageConfig,
) -> Result<Vec<WalRecord>, WalError> {
    let mut reader = WalReader::open(path, config)?;
    reader.iter().collect()
}

fn replay_from_bytes(data: &[u8]) -> Result<Vec<WalRecord>, WalError> {
    replay_from_bytes_with_config(data, StorageConfig::default())
}

fn replay_from_bytes_with_config(
    data: &[u8],
    config: StorageConfig,
) -> Result<Vec<WalRecord>, WalError> {
    let cursor = Cursor::new(data.to_vec());
    let mut reader = WalReader::from_reader(cursor, config);
    reader.iter().collect()
}

#[test]
fn write_and_replay_put_and_delete() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"a", Some(b"1")).unwrap();
        w.append(b"b", Some(b"2")).unwrap();
        w.append(b"a", None).unwrap();
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), 3);
    assert_eq!(recs[0].key(), b"a");
    assert_eq!(recs[1].key(), b"b");
    assert!(matches!(&recs[2], WalRecord::Delete { key, .. } if key == b"a"));
}

#[test]
fn timestamps_are_strictly_increasing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
    w.append(b"a", Some(b"1")).unwrap();
    w.append(b"b", Some(b"2")).unwrap();
    w.append(b"c", Some(b"3")).unwrap();
    drop(w);

    let recs = replay_all(&path).unwrap();
    let timestamps: Vec<u64> = recs.iter().map(WalRecord::timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn crash_recovery_scenario_from_spec() {
    // Append (t=1, put a=1), (t=2, put b=2), (t=3, delete a); simulate a
    // crash by never calling truncate. A fresh open must replay exactly
    // those three records, in order.
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"a", Some(b"1")).unwrap();
        w.append(b"b", Some(b"2")).unwrap();
        w.append(b"a", None).unwrap();
    }

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), 3);

    let mut seen_a_deleted = false;
    let mut seen_b = None;
    for rec in &recs {
        match rec {
            WalRecord::Put { key, value, .. } if key == b"b" => seen_b = Some(value.clone()),
            WalRecord::Delete { key, .. } if key == b"a" => seen_a_deleted = true,
            _ => {}
        }
    }
    assert!(seen_a_deleted);
    assert_eq!(seen_b, Some(b"2".to_vec()));
}

#[test]
fn truncate_resets_file_length_and_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
    w.append(b"a", Some(b"1")).unwrap();
    assert!(w.size_bytes().unwrap() > 0);

    w.truncate().unwrap();
    assert_eq!(w.size_bytes().unwrap(), 0);

    // truncating an already-empty WAL is a no-op
    w.truncate().unwrap();
    assert_eq!(w.size_bytes().unwrap(), 0);
}

#[test]
fn reopening_after_truncate_yields_fresh_monotonic_timestamps() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");

    let last_ts_before;
    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"a", Some(b"1")).unwrap();
        w.append(b"b", Some(b"2")).unwrap();
        last_ts_before = replay_all(&path).unwrap().last().unwrap().timestamp();
        w.truncate().unwrap();
    }

    let mut w2 = WalWriter::create(&path, StorageConfig::default()).unwrap();
    w2.append(b"c", Some(b"3")).unwrap();
    drop(w2);

    let recs = replay_all(&path).unwrap();
    assert_eq!(recs.len(), 1);
    assert!(recs[0].timestamp() > last_ts_before);
}

#[test]
fn truncated_tail_after_valid_records_stops_cleanly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"k1", Some(b"v1")).unwrap();
        w.append(b"k2", Some(b"v2")).unwrap();
    }

    let full = std::fs::read(&path).unwrap();

    // Truncate by 1..15 bytes (within the last record) and confirm the
    // reader stops before the partial record, yielding only the first.
    for cut in 1..=15usize {
        let truncated = &full[..full.len() - cut];
        let recs = replay_from_bytes(truncated).unwrap();
        assert_eq!(recs.len(), 1, "cut={cut}");
        assert_eq!(recs[0].key(), b"k1");
    }
}

#[test]
fn mid_log_corruption_surfaces_as_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"k1", Some(b"v1")).unwrap();
        w.append(b"k2", Some(b"v2")).unwrap();
    }

    let mut data = std::fs::read(&path).unwrap();
    // Flip a byte inside the first record's key, well before EOF.
    let target = 8 + 4 + 4; // first byte of the key
    data[target] ^= 0xFF;
    std::fs::write(&path, &data).unwrap();

    let err = replay_all(&path).unwrap_err();
    assert!(matches!(err, WalError::Corruption(_)));
}

#[test]
fn replay_rejects_value_exceeding_readers_configured_cap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        // Written under the default (loose) caps.
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"k", Some(&[0u8; 64])).unwrap();
    }

    // A reader opened with a stricter config must treat the oversize value
    // as corruption rather than silently replaying it.
    let strict = StorageConfig::default().with_max_value_bytes(16);
    let err = replay_all_with_config(&path, strict).unwrap_err();
    assert!(matches!(err, WalError::Corruption(_)));

    // The same bytes replay fine under a config that accepts them.
    assert_eq!(replay_all(&path).unwrap().len(), 1);
}

#[test]
fn replay_rejects_key_exceeding_readers_configured_cap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    {
        let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
        w.append(b"0123456789", Some(b"v")).unwrap();
    }

    let strict = StorageConfig::default().with_max_key_bytes(4);
    let err = replay_all_with_config(&path, strict).unwrap_err();
    assert!(matches!(err, WalError::Corruption(_)));
}

#[test]
fn append_rejects_empty_key() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
    let err = w.append(b"", Some(b"v")).unwrap_err();
    assert!(matches!(err, WalError::Invariant(_)));
}

#[test]
fn append_rejects_oversize_key_and_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.log");
    let cfg = StorageConfig::default()
        .with_max_key_bytes(4)
        .with_max_value_bytes(4);
    let mut w = WalWriter::create(&path, cfg).unwrap();

    assert!(matches!(
        w.append(b"toolong", Some(b"v")).unwrap_err(),
        WalError::Invariant(_)
    ));
    assert!(matches!(
        w.append(b"k", Some(b"toolong")).unwrap_err(),
        WalError::Invariant(_)
    ));
}

#[test]
fn opening_nonexistent_wal_for_writing_starts_fresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.log");
    let mut w = WalWriter::create(&path, StorageConfig::default()).unwrap();
    w.append(b"a", Some(b"1")).unwrap();
    drop(w);
    assert_eq!(replay_all(&path).unwrap().len(), 1);
}

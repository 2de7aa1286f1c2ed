use super::*;

#[test]
fn defaults_match_documented_values() {
    let cfg = StorageConfig::default();
    assert_eq!(cfg.memtable_flush_threshold_bytes, 4 * 1024 * 1024);
    assert_eq!(cfg.sstable_index_interval, 16);
    assert_eq!(cfg.max_key_bytes, 1024);
    assert_eq!(cfg.max_value_bytes, 1024 * 1024);
}

#[test]
fn builder_overrides_only_the_targeted_field() {
    let cfg = StorageConfig::new().with_flush_threshold_bytes(128);
    assert_eq!(cfg.memtable_flush_threshold_bytes, 128);
    assert_eq!(cfg.sstable_index_interval, 16);
}

#[test]
#[should_panic(expected = "sstable_index_interval must be nonzero")]
fn zero_index_interval_panics() {
    let _ = StorageConfig::new().with_sstable_index_interval(0);
}

use crate::tests::helpers::open_engine;
use tempfile::tempdir;

#[test]
fn miss_is_absent_not_an_error() {
    let dir = tempdir().unwrap();
    let engine = open_engine(&dir);

    assert_eq!(engine.get(b"never-written").unwrap(), None);
    engine.shutdown().unwrap();
}

#[test]
fn memtable_answers_before_segments() {
    let dir = tempdir().unwrap();
    let engine = open_engine(&dir);

    engine.set(b"k".to_vec(), b"on-disk".to_vec()).unwrap();
    engine.flush().unwrap();
    engine.set(b"k".to_vec(), b"in-memory".to_vec()).unwrap();

    assert_eq!(engine.get(b"k").unwrap(), Some(b"in-memory".to_vec()));
    engine.shutdown().unwrap();
}

#[test]
fn memtable_tombstone_shadows_segment_value() {
    let dir = tempdir().unwrap();
    let engine = open_engine(&dir);

    engine.set(b"x".to_vec(), b"1".to_vec()).unwrap();
    engine.flush().unwrap();
    engine.del(b"x".to_vec()).unwrap();

    // The tombstone lives only in the memtable; it must short-circuit the
    // probe before the segment's live value is consulted.
    assert_eq!(engine.get(b"x").unwrap(), None);
    engine.shutdown().unwrap();
}

#[test]
fn tombstone_in_newer_segment_shadows_older_segment() {
    let dir = tempdir().unwrap();
    let engine = open_engine(&dir);

    engine.set(b"x".to_vec(), b"1".to_vec()).unwrap();
    engine.flush().unwrap();
    engine.del(b"x".to_vec()).unwrap();
    engine.flush().unwrap();

    assert_eq!(engine.get(b"x").unwrap(), None);
    engine.shutdown().unwrap();
}

#[test]
fn distinct_keys_resolve_from_their_tiers() {
    let dir = tempdir().unwrap();
    let engine = open_engine(&dir);

    engine.set(b"cold".to_vec(), b"segment".to_vec()).unwrap();
    engine.flush().unwrap();
    engine.set(b"warm".to_vec(), b"memtable".to_vec()).unwrap();

    assert_eq!(engine.get(b"cold").unwrap(), Some(b"segment".to_vec()));
    assert_eq!(engine.get(b"warm").unwrap(), Some(b"memtable".to_vec()));
    engine.shutdown().unwrap();
}

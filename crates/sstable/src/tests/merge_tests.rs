use crate::tests::{del, put, write_records};
use crate::SSTable;
use tempfile::tempdir;

// A generous budget makes every test segment "undersized" so merge_pass
// always has candidates; a zero budget disables merging entirely.
const BIG_BUDGET: u64 = 8 * 1024 * 1024;

#[test]
fn pair_merge_combines_disjoint_keys() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), BIG_BUDGET).unwrap();

    write_records(&sst, vec![put("a", "1"), put("c", "3")]);
    write_records(&sst, vec![put("b", "2"), put("d", "4")]);

    sst.merge_pass().unwrap();

    assert_eq!(sst.segment_ids(), vec![2], "merged segment keeps the newer id");
    assert_eq!(sst.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(sst.get(b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(sst.get(b"c").unwrap(), Some(b"3".to_vec()));
    assert_eq!(sst.get(b"d").unwrap(), Some(b"4".to_vec()));

    assert!(!dir.path().join("000001.seg").exists());
    assert!(!dir.path().join("000001.sp").exists());
    assert!(dir.path().join("000002.seg").exists());
}

#[test]
fn pair_merge_resolves_overlap_newest_wins() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), BIG_BUDGET).unwrap();

    write_records(&sst, vec![put("k", "old"), put("other", "stays")]);
    write_records(&sst, vec![put("k", "new")]);

    sst.merge_pass().unwrap();

    assert_eq!(sst.segment_count(), 1);
    assert_eq!(sst.get(b"k").unwrap(), Some(b"new".to_vec()));
    assert_eq!(sst.get(b"other").unwrap(), Some(b"stays".to_vec()));
}

#[test]
fn pair_merge_preserves_tombstones() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), BIG_BUDGET).unwrap();

    write_records(&sst, vec![put("x", "1")]);
    write_records(&sst, vec![del("x"), put("y", "2")]);

    sst.merge_pass().unwrap();

    // The tombstone must survive the merge: an even older segment could
    // still hold a value for the key.
    assert_eq!(sst.segment_count(), 1);
    assert_eq!(sst.get(b"x").unwrap(), None);
    assert_eq!(sst.get(b"y").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn merge_pass_cascades_until_no_candidate_remains() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), BIG_BUDGET).unwrap();

    for i in 0..4 {
        write_records(&sst, vec![put(&format!("key{i}"), "v")]);
    }

    sst.merge_pass().unwrap();

    assert_eq!(sst.segment_ids(), vec![4]);
    for i in 0..4 {
        assert_eq!(
            sst.get(format!("key{i}").as_bytes()).unwrap(),
            Some(b"v".to_vec())
        );
    }
}

#[test]
fn well_sized_segments_are_left_alone() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), 0).unwrap();

    write_records(&sst, vec![put("a", "1")]);
    write_records(&sst, vec![put("b", "2")]);

    sst.merge_pass().unwrap();
    assert_eq!(sst.segment_ids(), vec![1, 2]);
}

#[test]
fn single_segment_has_no_merge_partner() {
    let dir = tempdir().unwrap();
    let sst = SSTable::load(dir.path(), BIG_BUDGET).unwrap();

    write_records(&sst, vec![put("a", "1")]);
    sst.merge_pass().unwrap();

    assert_eq!(sst.segment_ids(), vec![1]);
}

mod merge_tests;

use crate::{IterScanner, SSTable};
use record::Record;

pub(crate) fn write_records(sst: &SSTable, records: Vec<Record>) {
    sst.write(&mut IterScanner(records.into_iter())).unwrap();
}

pub(crate) fn put(key: &str, value: &str) -> Record {
    Record::put(key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

pub(crate) fn del(key: &str) -> Record {
    Record::tombstone(key.as_bytes().to_vec())
}

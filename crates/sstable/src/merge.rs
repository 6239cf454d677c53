//! Two-way merge of segment scanners.
//!
//! Both inputs produce records in ascending key order; the output is the
//! key-ordered union. When the same key appears on both sides the record
//! from the newer segment wins and the older one is dropped. Tombstones
//! pass through like any other record: the merged segment may still need
//! them to shadow keys living in segments older than the pair.

use std::cmp::Ordering;

use crate::segment::{SegmentScanner, SegmentWriter};
use crate::{RecordScanner, SstError};

/// Streams the merged contents of `older` and `newer` into `writer`.
pub(crate) fn merge_into(
    older: &mut SegmentScanner<'_>,
    newer: &mut SegmentScanner<'_>,
    writer: &mut SegmentWriter,
) -> Result<(), SstError> {
    let mut a = older.next_record()?;
    let mut b = newer.next_record()?;

    loop {
        match (a.take(), b.take()) {
            (None, None) => return Ok(()),
            (Some(ra), None) => {
                writer.write(&ra)?;
                a = older.next_record()?;
            }
            (None, Some(rb)) => {
                writer.write(&rb)?;
                b = newer.next_record()?;
            }
            (Some(ra), Some(rb)) => match ra.key.cmp(&rb.key) {
                Ordering::Less => {
                    writer.write(&ra)?;
                    a = older.next_record()?;
                    b = Some(rb);
                }
                Ordering::Greater => {
                    writer.write(&rb)?;
                    a = Some(ra);
                    b = newer.next_record()?;
                }
                Ordering::Equal => {
                    // Same key on both sides: the newer segment's record
                    // supersedes the older one.
                    writer.write(&rb)?;
                    a = older.next_record()?;
                    b = newer.next_record()?;
                }
            },
        }
    }
}

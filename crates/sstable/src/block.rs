use record::Record;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, RwLock};

use crate::{SstError, BLOCK_SIZE};

/// One fixed-size slot of a segment file: a packed, key-ordered run of
/// records followed by zero padding up to the slot boundary.
///
/// The record list is lazy. Nothing is read from disk until the first
/// lookup touches the block; the whole slot is then decoded (verifying
/// every CRC) and kept for the life of the segment.
pub(crate) struct Block {
    /// Byte offset of this block's slot in the segment file.
    pos: u64,
    min_key: Vec<u8>,
    max_key: Vec<u8>,
    chunks: RwLock<Option<Arc<Vec<Record>>>>,
}

impl Block {
    pub(crate) fn new(pos: u64, min_key: Vec<u8>, max_key: Vec<u8>) -> Self {
        Self {
            pos,
            min_key,
            max_key,
            chunks: RwLock::new(None),
        }
    }

    pub(crate) fn min_key(&self) -> &[u8] {
        &self.min_key
    }

    pub(crate) fn max_key(&self) -> &[u8] {
        &self.max_key
    }

    /// Point lookup. `file` is the owning segment's handle; the block
    /// itself never outlives the segment that created it.
    pub(crate) fn get(&self, key: &[u8], file: &Mutex<File>) -> Result<Option<Record>, SstError> {
        let chunks = self.load(file)?;
        if chunks.is_empty() {
            return Ok(None);
        }
        Ok(Self::middle_search(&chunks, key, 0, chunks.len() - 1).cloned())
    }

    /// Returns the decoded record list, reading the slot on first access.
    pub(crate) fn load(&self, file: &Mutex<File>) -> Result<Arc<Vec<Record>>, SstError> {
        if let Some(chunks) = self.chunks.read().unwrap().as_ref() {
            return Ok(Arc::clone(chunks));
        }

        let mut slot = self.chunks.write().unwrap();
        if let Some(chunks) = slot.as_ref() {
            return Ok(Arc::clone(chunks));
        }

        // A partial final slot is fine; decode stops at the padding or at
        // however many bytes the file still had.
        let mut buf = Vec::with_capacity(BLOCK_SIZE);
        {
            let mut f = file.lock().unwrap();
            f.seek(SeekFrom::Start(self.pos))?;
            f.by_ref().take(BLOCK_SIZE as u64).read_to_end(&mut buf)?;
        }

        let mut cur = Cursor::new(buf.as_slice());
        let mut records = Vec::new();
        while let Some(rec) = Record::decode_from(&mut cur)? {
            records.push(rec);
        }

        let chunks = Arc::new(records);
        *slot = Some(Arc::clone(&chunks));
        Ok(chunks)
    }

    /// Recursive binary search over the ordered record run.
    ///
    /// Bounds are inclusive on both ends; callers guarantee a non-empty
    /// slice.
    fn middle_search<'a>(
        chunks: &'a [Record],
        key: &[u8],
        begin: usize,
        end: usize,
    ) -> Option<&'a Record> {
        if key < chunks[begin].key.as_slice() || key > chunks[end].key.as_slice() {
            return None;
        }
        if chunks[begin].key.as_slice() == key {
            return Some(&chunks[begin]);
        }
        if chunks[end].key.as_slice() == key {
            return Some(&chunks[end]);
        }
        if end - begin <= 1 {
            return None;
        }
        let middle = (begin + end) / 2;
        match key.cmp(chunks[middle].key.as_slice()) {
            std::cmp::Ordering::Equal => Some(&chunks[middle]),
            std::cmp::Ordering::Less => Self::middle_search(chunks, key, begin, middle),
            std::cmp::Ordering::Greater => Self::middle_search(chunks, key, middle, end),
        }
    }
}

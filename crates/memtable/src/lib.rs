//! # Memtable — in-memory ordered table
//!
//! The mutable tier of the store: an ordered map from key to
//! `(value, tombstone)` backed by a probabilistic skip list. One writer at
//! a time mutates it under an exclusive lock; point reads share a read
//! lock. Once the engine seals a table no further writers exist, and the
//! flush path walks it in key order through [`Memtable::read`].

mod skiplist;

pub use skiplist::{Iter, SkipList, MAX_LEVEL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a point lookup.
///
/// A tombstone is an observation, not an absence: it shadows any older
/// value for the key in colder tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Value(Vec<u8>),
    Tombstone,
}

/// A skip list behind a reader/writer lock, with a stable integer id.
///
/// The id is unique for the process lifetime; the engine uses it to pair
/// each table with its write-ahead log.
pub struct Memtable {
    id: u64,
    list: RwLock<SkipList>,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            list: RwLock::new(SkipList::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Inserts or overwrites the entry for `key`.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>, tombstone: bool) {
        self.list.write().unwrap().set(key, value, tombstone);
    }

    /// Most recent stored state for `key`: a live value, a tombstone, or
    /// `None` when the table has never seen the key.
    pub fn get(&self, key: &[u8]) -> Option<Lookup> {
        let list = self.list.read().unwrap();
        list.get(key).map(|(value, tombstone)| {
            if tombstone {
                Lookup::Tombstone
            } else {
                Lookup::Value(value.to_vec())
            }
        })
    }

    /// Cumulative byte size of first insertions; the flush trigger signal.
    pub fn size(&self) -> u64 {
        self.list.read().unwrap().size()
    }

    pub fn is_empty(&self) -> bool {
        self.list.read().unwrap().is_empty()
    }

    /// Read access for ordered scans (`guard.iter()`). Callers hold the
    /// guard for the duration of the walk; on a sealed table this is
    /// uncontended.
    pub fn read(&self) -> RwLockReadGuard<'_, SkipList> {
        self.list.read().unwrap()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_tombstone() {
        let table = Memtable::new();
        table.set(b"k1".to_vec(), b"v1".to_vec(), false);
        assert_eq!(table.get(b"k1"), Some(Lookup::Value(b"v1".to_vec())));

        table.set(b"k1".to_vec(), b"v2".to_vec(), false);
        assert_eq!(table.get(b"k1"), Some(Lookup::Value(b"v2".to_vec())));

        table.set(b"k1".to_vec(), Vec::new(), true);
        assert_eq!(table.get(b"k1"), Some(Lookup::Tombstone));

        assert_eq!(table.get(b"missing"), None);
    }

    #[test]
    fn ids_are_unique() {
        let a = Memtable::new();
        let b = Memtable::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn scan_through_read_guard() {
        let table = Memtable::new();
        table.set(b"b".to_vec(), b"2".to_vec(), false);
        table.set(b"a".to_vec(), b"1".to_vec(), false);
        table.set(b"c".to_vec(), Vec::new(), true);

        let list = table.read();
        let records: Vec<_> = list.iter().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].key, b"a");
        assert_eq!(records[1].key, b"b");
        assert_eq!(records[2].key, b"c");
        assert!(records[2].tombstone);
    }

    #[test]
    fn concurrent_readers_during_writes() {
        use std::sync::Arc;
        use std::thread;

        let table = Arc::new(Memtable::new());
        let writer = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    table.set(
                        format!("key{i:04}").into_bytes(),
                        i.to_be_bytes().to_vec(),
                        false,
                    );
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for i in 0..1000u32 {
                        if let Some(Lookup::Value(v)) = table.get(format!("key{i:04}").as_bytes())
                        {
                            assert_eq!(v, i.to_be_bytes().to_vec());
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(table.read().len(), 1000);
    }
}

//! Write path: `set()`, `del()`, `flush()`, and the flush state machine.
//!
//! Every mutation goes to the active memtable's WAL first, then into the
//! memtable itself; only then is the write acknowledged. When the active
//! table's size passes the segment budget the engine seals it, installs a
//! fresh active table, and hands the sealed one to a worker thread that
//! writes it out as a segment and retires it.

use log::{error, info};
use memtable::Memtable;
use record::Record;
use std::sync::Arc;

use crate::{EngineError, Engine, Inner, Result};

impl Engine {
    /// Inserts or overwrites a key-value pair.
    ///
    /// On success the record is in the WAL (handed to the OS) and visible
    /// to readers. May trigger a background flush on the way out.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.inner.apply(key, value, false)
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// The tombstone shadows any older value for the key in sealed
    /// memtables and on-disk segments.
    pub fn del(&self, key: Vec<u8>) -> Result<()> {
        self.inner.apply(key, Vec::new(), true)
    }

    /// Synchronously seals the active memtable and writes it out.
    ///
    /// A no-op when the active table is empty. Mostly useful for tests
    /// and for callers that want a durability point without waiting for
    /// the size trigger.
    pub fn flush(&self) -> Result<()> {
        if self.inner.is_shutting_down() {
            return Err(EngineError::ShuttingDown);
        }

        // Same slot the background flush uses: only one rotation and
        // persist is ever in flight, whoever initiates it.
        self.inner.claim_flush_slot();

        let sealed = {
            let tables = self.inner.tables.read().unwrap();
            match tables.last() {
                Some(active) if !active.is_empty() => Some(Arc::clone(active)),
                _ => None,
            }
        };

        let result = match sealed {
            None => Ok(()),
            Some(sealed) => {
                self.inner.push_fresh_table();
                match self.inner.persist_table(&sealed) {
                    Ok(()) => {
                        self.inner.retire_table(&sealed);
                        Ok(())
                    }
                    // The sealed table and its WAL stay behind; shutdown
                    // or the next open picks them up.
                    Err(e) => Err(e),
                }
            }
        };

        self.inner.release_flush_slot();
        result
    }
}

impl Inner {
    fn apply(self: &Arc<Self>, key: Vec<u8>, value: Vec<u8>, tombstone: bool) -> Result<()> {
        if self.is_shutting_down() {
            return Err(EngineError::ShuttingDown);
        }
        if key.is_empty() || key.len() > record::MAX_KEY_LEN {
            return Err(EngineError::InvalidKey(key.len()));
        }

        let record = if tombstone {
            Record::tombstone(key)
        } else {
            Record::put(key, value)
        };
        // Reject anything a segment writer could never store; a flush must
        // not be the first place this fails.
        if record.value.len() > record::MAX_VALUE_LEN
            || record.encoded_len() > sstable::BLOCK_SIZE
        {
            return Err(EngineError::TooLarge {
                size: record.encoded_len(),
                capacity: sstable::BLOCK_SIZE,
            });
        }

        let size = {
            let tables = self.tables.read().unwrap();
            let Some(active) = tables.last() else {
                return Err(EngineError::ShuttingDown);
            };

            // WAL first. If the append fails the memtable is untouched and
            // the error goes straight back to the caller.
            {
                let wals = self.wals.read().unwrap();
                if let Some(wal) = wals.get(&active.id()) {
                    wal.lock().unwrap().append(&record)?;
                }
            }

            active.set(record.key, record.value, record.tombstone);
            active.size()
        };

        if size > self.config.segment_size {
            self.initiate_flush();
        }
        Ok(())
    }

    /// Seals the active table and dispatches the segment write.
    ///
    /// Non-blocking when a flush is already running; the size trigger will
    /// fire again on a later write.
    fn initiate_flush(self: &Arc<Self>) {
        let mut flush = self.flush.lock().unwrap();
        if flush.in_progress {
            return;
        }
        flush.in_progress = true;

        // Rotation: the fresh table becomes active, the previous tail is
        // now sealed and owned by the flush below.
        self.push_fresh_table();

        let inner = Arc::clone(self);
        flush.worker = Some(std::thread::spawn(move || {
            inner.flush_head();
            inner.release_flush_slot();
        }));
    }

    /// Worker body: persist the sealed table at the head of the vector.
    ///
    /// A segment write failure here is fatal. The write was already
    /// acknowledged to the client, so the process must stop while the WAL
    /// still holds it; the next open replays it.
    fn flush_head(&self) {
        let table: Option<Arc<Memtable>> = { self.tables.read().unwrap().first().cloned() };
        let Some(table) = table else { return };

        info!("flush of memtable {} started", table.id());
        if let Err(e) = self.persist_table(&table) {
            error!("flush failed, aborting to preserve the wal: {e}");
            std::process::exit(1);
        }
        self.retire_table(&table);
        info!("flush of memtable {} finished", table.id());
    }
}

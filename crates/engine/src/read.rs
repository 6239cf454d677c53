//! Read path: point lookups.
//!
//! Memtables are probed newest to oldest, then the SSTable probes its
//! segments newest to oldest. The first tier that knows the key decides
//! the answer: a live value is returned, a tombstone short-circuits to
//! "absent" without consulting anything older.

use memtable::Lookup;
use std::sync::Arc;

use crate::{EngineError, Engine, Result};

impl Engine {
    /// Looks up `key`, returning its value or `None` when the key is
    /// absent (never written, or shadowed by a tombstone).
    ///
    /// # Errors
    ///
    /// [`EngineError::ShuttingDown`] after shutdown began, or any error
    /// the segment layer hits while reading (corruption, I/O).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.inner.is_shutting_down() {
            return Err(EngineError::ShuttingDown);
        }

        // Snapshot the vector so the probe runs without holding the lock
        // across file I/O; a concurrently completing flush has already
        // persisted whatever table it removes.
        let tables = {
            let guard = self.inner.tables.read().unwrap();
            guard.iter().map(Arc::clone).collect::<Vec<_>>()
        };

        for table in tables.iter().rev() {
            match table.get(key) {
                Some(Lookup::Value(value)) => return Ok(Some(value)),
                Some(Lookup::Tombstone) => return Ok(None),
                None => {}
            }
        }

        Ok(self.inner.sstable.get(key)?)
    }
}

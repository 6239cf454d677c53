//! # Engine — the storage facade
//!
//! Ties the [`memtable`], [`wal`], and [`sstable`] crates together into a
//! complete LSM key-value store with point `get`/`set`/`del` and
//! last-write-wins semantics.
//!
//! ## Architecture
//!
//! ```text
//! Client threads
//!      |
//!      v
//! ┌───────────────────────────────────────────────────┐
//! │                     ENGINE                        │
//! │                                                   │
//! │ write.rs → WAL append → active memtable insert    │
//! │               |                                   │
//! │               |  (size over segment budget?)      │
//! │               v             yes                   │
//! │        seal + rotate → flush worker → new segment │
//! │                                                   │
//! │ read.rs → memtables (newest first)                │
//! │             → segments (newest first)             │
//! │               (first match wins, tombstones hide) │
//! │                                                   │
//! │ recovery.rs → replay *.log → segments → unlink    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Crash safety
//!
//! Every mutation is appended to the active memtable's WAL before the
//! in-memory insert; a WAL failure surfaces to the caller and the insert
//! never happens. A memtable's WAL is unlinked only after the memtable has
//! been durably written as a segment. On startup every surviving log is
//! replayed into a fresh memtable, persisted as a segment, and deleted.
//!
//! ## Concurrency
//!
//! The engine is a cheaply cloneable handle (`Arc` inside); all methods
//! take `&self`. Readers and writers share the memtable vector under a
//! reader/writer lock; rotation during a flush briefly takes the write
//! side. Each flush runs on its own worker thread, one at a time.

mod config;
mod error;
mod flock;
mod read;
mod recovery;
mod write;

pub use config::Config;
pub use error::{EngineError, Result};

use flock::LockFile;
use log::info;
use memtable::Memtable;
use sstable::SSTable;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use wal::Wal;

/// Name of the advisory lock file inside the data directory.
const LOCK_FILE_NAME: &str = "LOCK";

/// The storage engine. Clone freely; all clones share one store.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: Config,
    /// Live memtables, oldest first. Length 1 in steady state, 2 while a
    /// flush is in progress; the tail is the active (writable) table.
    tables: RwLock<Vec<Arc<Memtable>>>,
    /// WAL paired with each live memtable, keyed by memtable id.
    wals: RwLock<HashMap<u64, Mutex<Wal>>>,
    sstable: Arc<SSTable>,
    flush: Mutex<FlushState>,
    /// Signalled whenever `flush.in_progress` clears; lets a synchronous
    /// flush (or shutdown) wait out the current holder without spinning.
    flush_done: Condvar,
    shutdown: AtomicBool,
    /// Exclusive claim on the data directory; released at shutdown (or
    /// drop) so a successor can open the same store.
    lock: Mutex<Option<LockFile>>,
}

#[derive(Default)]
pub(crate) struct FlushState {
    pub(crate) in_progress: bool,
    pub(crate) worker: Option<JoinHandle<()>>,
}

impl Engine {
    /// Opens (or creates) a store per `config`.
    ///
    /// Steps: create the directories, load existing segments, replay and
    /// retire every surviving WAL, then stand up a fresh active memtable.
    /// Any failure aborts the open; partially recovered state on disk is
    /// fine, the next open picks up where this one stopped.
    pub fn open(config: Config) -> Result<Engine> {
        fs::create_dir_all(&config.data_dir)?;
        fs::create_dir_all(&config.wal_dir)?;

        let lock = LockFile::acquire(&config.data_dir.join(LOCK_FILE_NAME))?;

        let sstable = Arc::new(SSTable::load(&config.data_dir, config.segment_size)?);
        recovery::replay_wal_dir(&config.wal_dir, &sstable)?;

        let merge_enabled = config.merge_enabled;
        let inner = Arc::new(Inner {
            config,
            tables: RwLock::new(Vec::with_capacity(2)),
            wals: RwLock::new(HashMap::new()),
            sstable,
            flush: Mutex::new(FlushState::default()),
            flush_done: Condvar::new(),
            shutdown: AtomicBool::new(false),
            lock: Mutex::new(Some(lock)),
        });
        inner.push_fresh_table();

        if merge_enabled {
            inner.sstable.start_merge_monitor();
        }

        info!(
            "engine opened: {} segment(s) under {}",
            inner.sstable.segment_count(),
            inner.config.data_dir.display()
        );
        Ok(Engine { inner })
    }

    /// Number of on-disk segments currently loaded.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.inner.sstable.segment_count()
    }

    /// Segment ids, ascending.
    #[must_use]
    pub fn segment_ids(&self) -> Vec<u64> {
        self.inner.sstable.segment_ids()
    }

    /// Stops accepting work, persists everything, and tears down the
    /// background machinery. Idempotent; later API calls fail with
    /// [`EngineError::ShuttingDown`].
    ///
    /// Waits for an in-flight flush, then synchronously flushes every
    /// remaining memtable (removing its WAL) and stops the merge monitor.
    /// After a successful return a fresh [`Engine::open`] on the same
    /// directories sees exactly the acknowledged writes.
    pub fn shutdown(&self) -> Result<()> {
        if self
            .inner
            .shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        info!("engine shutting down");

        self.inner.join_flush_worker();
        // A synchronous flush may still hold the slot; wait it out, then
        // keep the claim so nothing rotates while the drain runs.
        self.inner.claim_flush_slot();

        let drained = self.inner.drain_tables();
        self.inner.release_flush_slot();
        drained?;

        self.inner.sstable.close();
        self.inner.lock.lock().unwrap().take();
        info!("engine shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("data_dir", &self.inner.config.data_dir)
            .field("wal_dir", &self.inner.config.wal_dir)
            .field("segment_size", &self.inner.config.segment_size)
            .field("memtable_count", &self.inner.tables.read().unwrap().len())
            .field("segment_count", &self.inner.sstable.segment_count())
            .field("shutdown", &self.inner.shutdown.load(Ordering::SeqCst))
            .finish()
    }
}

impl Inner {
    /// Creates a memtable + WAL pair and appends it as the new active
    /// table. Both land under the vector write lock, so any writer that
    /// can see the table can also see its log. Lock order is always
    /// `tables` before `wals`.
    pub(crate) fn push_fresh_table(&self) -> Arc<Memtable> {
        let mut tables = self.tables.write().unwrap();
        let table = Arc::new(Memtable::new());
        self.wals.write().unwrap().insert(
            table.id(),
            Mutex::new(Wal::new(&self.config.wal_dir, self.config.sync_every_write)),
        );
        tables.push(Arc::clone(&table));
        table
    }

    /// Drops a flushed memtable and unlinks its WAL.
    pub(crate) fn retire_table(&self, table: &Memtable) {
        {
            let mut tables = self.tables.write().unwrap();
            if let Some(pos) = tables.iter().position(|t| t.id() == table.id()) {
                tables.remove(pos);
            }
        }
        let wal = self.wals.write().unwrap().remove(&table.id());
        if let Some(wal) = wal {
            if let Err(e) = wal.into_inner().unwrap().remove() {
                log::error!("failed to remove wal for memtable {}: {e}", table.id());
            }
        }
    }

    /// Persists and retires every remaining memtable, oldest first.
    /// Callers hold the flush slot.
    fn drain_tables(&self) -> Result<()> {
        loop {
            let table = { self.tables.read().unwrap().first().cloned() };
            let Some(table) = table else { return Ok(()) };
            self.persist_table(&table)?;
            self.retire_table(&table);
        }
    }

    /// Writes a memtable out as a new segment. Empty tables produce no
    /// segment.
    pub(crate) fn persist_table(&self, table: &Memtable) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        let list = table.read();
        self.sstable.write(&mut sstable::IterScanner(list.iter()))?;
        Ok(())
    }

    pub(crate) fn join_flush_worker(&self) {
        let worker = { self.flush.lock().unwrap().worker.take() };
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }

    /// Claims the flush slot, waiting until no other flush (background or
    /// synchronous) holds it. Exactly one rotation and persist can be in
    /// flight at a time; everything that seals a memtable goes through
    /// this claim.
    pub(crate) fn claim_flush_slot(&self) {
        let mut flush = self.flush.lock().unwrap();
        while flush.in_progress {
            flush = self.flush_done.wait(flush).unwrap();
        }
        flush.in_progress = true;
    }

    /// Releases the flush slot and wakes any waiters.
    pub(crate) fn release_flush_slot(&self) {
        self.flush.lock().unwrap().in_progress = false;
        self.flush_done.notify_all();
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Dropping the last handle without a prior `shutdown` models a crash:
/// the merge monitor is stopped so no thread leaks, but nothing is
/// flushed; surviving WALs carry the un-flushed writes to the next open.
impl Drop for Inner {
    fn drop(&mut self) {
        self.sstable.close();
    }
}

#[cfg(test)]
mod tests;

//! # SSTable — the on-disk sorted layer
//!
//! An ordered collection of immutable segments under one root directory.
//! Each segment (`NNNNNN.seg`) is a run of fixed 64 KiB block slots paired
//! with a sidecar index (`NNNNNN.sp`) of per-block key ranges. Segment ids
//! grow monotonically, and a larger id always holds logically newer
//! writes, so a point lookup probes segments newest-first and stops at the
//! first hit.
//!
//! Writing goes through [`SSTable::write`]: a fresh segment is streamed
//! from a [`RecordScanner`] (the flush path hands in a sealed memtable's
//! ordered iterator), finalized, fsynced, and appended to the list.
//!
//! An optional monitor thread reclaims space by pair-merging any segment
//! smaller than half the segment budget into its immediate older
//! neighbor. The merged segment keeps the newer id, so lookup ordering is
//! unaffected. Lookups and the merge swap serialize on the segment-list
//! lock.

mod block;
mod merge;
mod segment;

pub use segment::{Segment, SegmentScanner};

use log::{info, warn};
use record::{CodecError, Record};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

/// Fixed byte stride of a block slot inside a segment file.
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Extension of segment data files.
pub const SEGMENT_EXT: &str = "seg";
/// Extension of sidecar index files.
pub const SIDECAR_EXT: &str = "sp";

/// How often the merge monitor scans the segment list.
const MERGE_INTERVAL: Duration = Duration::from_secs(5);

/// Errors surfaced by the on-disk layer.
#[derive(Debug, Error)]
pub enum SstError {
    /// An underlying I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A block or sidecar failed validation while being read back.
    #[error("corrupt segment data")]
    Corrupt,

    /// A single record is too big to ever fit a block slot.
    #[error("record of {size} bytes exceeds block capacity {capacity}")]
    TooLarge { size: usize, capacity: usize },
}

impl From<CodecError> for SstError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => SstError::Io(io),
            CodecError::Corrupt | CodecError::OutOfRange(_) => SstError::Corrupt,
        }
    }
}

/// An ordered, finite stream of records; the seam between the memtable,
/// the segment reader, and the segment writer.
pub trait RecordScanner {
    fn next_record(&mut self) -> Result<Option<Record>, SstError>;
}

/// Adapts any ordered record iterator to the scanner seam; the flush path
/// wraps a sealed memtable's iterator in one of these to feed
/// [`SSTable::write`].
pub struct IterScanner<I>(pub I);

impl<I: Iterator<Item = Record>> RecordScanner for IterScanner<I> {
    fn next_record(&mut self) -> Result<Option<Record>, SstError> {
        Ok(self.0.next())
    }
}

/// The segment collection: loading, writing, point lookup, and background
/// merging.
pub struct SSTable {
    root: PathBuf,
    /// Per-segment size budget; the engine owns the configured value and
    /// passes it down once at construction.
    segment_size: u64,
    /// Sorted by id ascending. Guarded so lookups and merge swaps
    /// serialize; lookups clone the `Arc`s and probe without the lock.
    segments: RwLock<Vec<Arc<Segment>>>,
    /// Serializes [`SSTable::write`] callers. Held from id allocation
    /// through the temp-file build and rename, so two writers can never
    /// claim the same id or clobber each other's temp files. Lookups
    /// stay on the `segments` lock.
    writer: Mutex<()>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<(Mutex<bool>, Condvar)>,
}

impl SSTable {
    /// Loads every segment under `root`, ascending by id.
    ///
    /// Leftover `.tmp` files from an interrupted flush or merge are
    /// removed first; they were never part of the durable state.
    pub fn load<P: AsRef<Path>>(root: P, segment_size: u64) -> Result<Self, SstError> {
        let root = root.as_ref().to_path_buf();

        let mut ids = Vec::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".tmp") {
                let _ = fs::remove_file(&path);
                continue;
            }
            if path.extension().map(|e| e == SEGMENT_EXT).unwrap_or(false) {
                match path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.parse::<u64>().ok())
                {
                    Some(id) => ids.push(id),
                    None => warn!("ignoring unrecognized segment file {}", path.display()),
                }
            }
        }
        ids.sort_unstable();

        let mut segments = Vec::with_capacity(ids.len());
        for id in ids {
            segments.push(Arc::new(Segment::open(&root, id)?));
        }

        Ok(Self {
            root,
            segment_size,
            segments: RwLock::new(segments),
            writer: Mutex::new(()),
            monitor: Mutex::new(None),
            stop: Arc::new((Mutex::new(false), Condvar::new())),
        })
    }

    /// Streams `scanner` into a brand-new segment and appends it.
    ///
    /// The new segment's id is one past the current maximum (1 for an
    /// empty table), so it is the newest by construction. Safe to call
    /// from several threads: writers queue on an internal lock for the
    /// whole allocate-build-rename sequence.
    pub fn write<S: RecordScanner>(&self, scanner: &mut S) -> Result<(), SstError> {
        let _writing = self.writer.lock().unwrap();

        // The max id cannot move underneath us: other writers queue on
        // the lock above, and a merge only ever reuses an existing id.
        let id = {
            let segments = self.segments.read().unwrap();
            segments.last().map(|s| s.id() + 1).unwrap_or(1)
        };

        let mut writer = segment::SegmentWriter::create(&self.root, id)?;
        while let Some(rec) = scanner.next_record()? {
            writer.write(&rec)?;
        }
        let segment = writer.finish()?;

        self.segments.write().unwrap().push(Arc::new(segment));
        Ok(())
    }

    /// Point lookup, newest segment first.
    ///
    /// The first segment that knows the key decides: a live record yields
    /// its value, a tombstone yields "absent".
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, SstError> {
        let segments: Vec<Arc<Segment>> = {
            let guard = self.segments.read().unwrap();
            guard.iter().rev().cloned().collect()
        };

        for segment in segments {
            if let Some(rec) = segment.get(key)? {
                return Ok(if rec.tombstone { None } else { Some(rec.value) });
            }
        }
        Ok(None)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().unwrap().len()
    }

    /// Segment ids, ascending.
    pub fn segment_ids(&self) -> Vec<u64> {
        self.segments.read().unwrap().iter().map(|s| s.id()).collect()
    }

    /// Spawns the background merge monitor.
    ///
    /// The monitor wakes every few seconds, merges undersized segments
    /// pairwise, and exits promptly when [`close`](SSTable::close) flips
    /// the stop signal.
    pub fn start_merge_monitor(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = std::thread::spawn(move || this.merge_loop());
        *self.monitor.lock().unwrap() = Some(handle);
    }

    fn merge_loop(&self) {
        let (stopped, cvar) = &*self.stop;
        loop {
            {
                let guard = stopped.lock().unwrap();
                if *guard {
                    return;
                }
                let (guard, _) = cvar.wait_timeout(guard, MERGE_INTERVAL).unwrap();
                if *guard {
                    return;
                }
            }
            if let Err(e) = self.merge_pass() {
                warn!("segment merge failed: {e}");
            }
        }
    }

    /// One sweep of the merge heuristic: while any segment with an older
    /// neighbor is under half the budget, merge the pair.
    ///
    /// The merged pair can exceed the budget; this reclaims space, it does
    /// not regulate size.
    pub fn merge_pass(&self) -> Result<(), SstError> {
        loop {
            let pair = {
                let segments = self.segments.read().unwrap();
                segments
                    .windows(2)
                    .find(|w| w[1].size() < self.segment_size / 2)
                    .map(|w| (Arc::clone(&w[0]), Arc::clone(&w[1])))
            };
            let Some((older, newer)) = pair else {
                return Ok(());
            };
            self.merge_pair(&older, &newer)?;
        }
    }

    /// Merges `older` into `newer`, producing a replacement segment that
    /// keeps the newer id.
    fn merge_pair(&self, older: &Segment, newer: &Segment) -> Result<(), SstError> {
        info!(
            "merging segment {:06} into {:06}",
            older.id(),
            newer.id()
        );

        let mut writer = segment::SegmentWriter::create(&self.root, newer.id())?;
        merge::merge_into(&mut older.scanner(), &mut newer.scanner(), &mut writer)?;

        // The swap itself runs under the write lock so lookups never see a
        // half-replaced list.
        let mut segments = self.segments.write().unwrap();
        let merged = Arc::new(writer.finish()?);
        if let Some(slot) = segments.iter_mut().find(|s| s.id() == newer.id()) {
            *slot = merged;
        }
        segments.retain(|s| s.id() != older.id());
        drop(segments);

        older.delete_files()?;
        Ok(())
    }

    /// Stops and joins the merge monitor. Segment files close when the
    /// last handle drops.
    pub fn close(&self) {
        {
            let (stopped, cvar) = &*self.stop;
            *stopped.lock().unwrap() = true;
            cvar.notify_all();
        }
        if let Some(handle) = self.monitor.lock().unwrap().take() {
            if handle.join().is_err() {
                warn!("merge monitor exited abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests;

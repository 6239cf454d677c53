//! Cold-start recovery: replay surviving WALs into segments.
//!
//! A WAL file on disk means its memtable never made it into a segment.
//! Each one is replayed (in file-name order, which is creation order)
//! into a fresh memtable, written out as a segment when non-empty, and
//! unlinked. A corrupt or unreadable log aborts the open and stays on
//! disk so the next open can retry.

use log::info;
use memtable::Memtable;
use sstable::{IterScanner, SSTable};
use std::fs;
use std::path::{Path, PathBuf};
use wal::WalReader;

use crate::Result;

pub(crate) fn replay_wal_dir(wal_dir: &Path, sstable: &SSTable) -> Result<()> {
    let mut logs: Vec<PathBuf> = fs::read_dir(wal_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == wal::WAL_EXT).unwrap_or(false))
        .collect();
    logs.sort();

    for path in logs {
        info!("replaying wal {}", path.display());

        let table = Memtable::new();
        let mut reader = WalReader::open(&path)?;
        let mut replayed = 0usize;
        while let Some(rec) = reader.read_record()? {
            table.set(rec.key, rec.value, rec.tombstone);
            replayed += 1;
        }

        // An empty log yields no segment but is still retired.
        if !table.is_empty() {
            let list = table.read();
            sstable.write(&mut IterScanner(list.iter()))?;
        }
        fs::remove_file(&path)?;

        info!("replayed {replayed} record(s) from {}", path.display());
    }

    Ok(())
}

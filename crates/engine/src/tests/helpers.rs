use crate::{Config, Engine};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A config rooted in `dir` with a small segment budget, per-write fsync
/// off, and background merging disabled so tests control compaction.
pub(crate) fn test_config(dir: &TempDir) -> Config {
    Config::new(dir.path().join("data"))
        .with_segment_size(1024 * 1024)
        .with_sync_every_write(false)
        .with_merge_enabled(false)
}

pub(crate) fn open_engine(dir: &TempDir) -> Engine {
    Engine::open(test_config(dir)).unwrap()
}

pub(crate) fn count_files_with_ext(dir: &Path, ext: &str) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .map(|e| e == ext)
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}

pub(crate) fn wal_file_count(dir: &TempDir) -> usize {
    count_files_with_ext(&dir.path().join("data").join("wal"), "log")
}

pub(crate) fn segment_file_count(dir: &TempDir) -> usize {
    count_files_with_ext(&dir.path().join("data"), "seg")
}

use std::path::PathBuf;

/// Tunable parameters for the storage engine.
///
/// The segment size lives here and only here; the engine hands it to the
/// SSTable layer at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding segment data and sidecar files.
    pub data_dir: PathBuf,

    /// Directory holding write-ahead logs, one per live memtable.
    pub wal_dir: PathBuf,

    /// Per-segment size budget in bytes. Doubles as the memtable flush
    /// threshold (a soft bound; the size counter is approximate).
    pub segment_size: u64,

    /// When `true`, every WAL append is followed by fsync. Off by
    /// default: appends always reach the OS before returning, and the log
    /// is synced on close.
    pub sync_every_write: bool,

    /// Whether to run the background segment merge monitor.
    pub merge_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/platodb"),
            wal_dir: PathBuf::from("/var/platodb/wal"),
            segment_size: 8 * 1024 * 1024,
            sync_every_write: false,
            merge_enabled: true,
        }
    }
}

impl Config {
    /// A config rooted at `data_dir`, with the WAL directory nested under
    /// it the way the defaults are laid out.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let wal_dir = data_dir.join("wal");
        Self {
            data_dir,
            wal_dir,
            ..Default::default()
        }
    }

    pub fn with_wal_dir(mut self, wal_dir: impl Into<PathBuf>) -> Self {
        self.wal_dir = wal_dir.into();
        self
    }

    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size = bytes;
        self
    }

    pub fn with_sync_every_write(mut self, sync: bool) -> Self {
        self.sync_every_write = sync;
        self
    }

    pub fn with_merge_enabled(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }
}

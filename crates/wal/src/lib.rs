//! # WAL — Write-Ahead Log
//!
//! Crash-safe durability for the storage engine. Every mutation (`SET` or
//! `DEL`) is encoded as a [`Record`] and appended to the log **before** the
//! corresponding in-memory update. On restart surviving logs are replayed
//! to rebuild the memtables they were paired with, so no acknowledged
//! write is lost.
//!
//! One log file exists per live memtable, named after its creation time
//! (`YYYYMMDDhhmmss.log`) inside the WAL directory. The file itself is
//! created lazily on the first append; a memtable that never received a
//! write leaves nothing behind. After the memtable has been persisted as a
//! segment the log is closed and unlinked via [`Wal::remove`].
//!
//! ## Durability
//!
//! `append` hands the encoded bytes to the operating system before
//! returning (a plain `write` on an unbuffered file). fsync runs on every
//! append when the log was opened with `sync = true`, and always before
//! the file is closed. A crash may therefore lose writes that were
//! accepted but not yet synced; it can never lose a write once the paired
//! memtable has been flushed and the engine shut down cleanly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::Record;
//! use wal::{Wal, WalReader};
//!
//! let mut w = Wal::new("wal", true);
//! w.append(&Record::put(b"hello".to_vec(), b"world".to_vec())).unwrap();
//! let path = w.path().unwrap().to_path_buf();
//! drop(w);
//!
//! let mut r = WalReader::open(&path).unwrap();
//! while let Some(rec) = r.read_record().unwrap() {
//!     println!("{:?}", rec);
//! }
//! ```

use chrono::{DateTime, Duration, Local};
use record::{CodecError, Record};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// File extension for WAL files.
pub const WAL_EXT: &str = "log";

/// Timestamp layout used for WAL file names.
const NAME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A fully-read record failed CRC validation, or a record could not be
    /// encoded for the wire.
    #[error("corrupt wal record")]
    Corrupt,
}

impl From<CodecError> for WalError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(io) => WalError::Io(io),
            CodecError::Corrupt | CodecError::OutOfRange(_) => WalError::Corrupt,
        }
    }
}

/// Append-only WAL writer paired with one memtable.
///
/// Records are encoded into a reusable scratch buffer and written with a
/// single `write_all` per append. When `sync` is `true`, every append is
/// followed by `sync_all()` (fsync) so the record is durable before the
/// call returns.
pub struct Wal {
    dir: PathBuf,
    sync: bool,
    /// Backing file, created on the first append.
    file: Option<(PathBuf, File)>,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl Wal {
    /// Prepares a WAL inside `dir`.
    ///
    /// No file is touched yet; the timestamp-named file springs into
    /// existence on the first [`append`](Wal::append).
    pub fn new<P: AsRef<Path>>(dir: P, sync: bool) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            sync,
            file: None,
            buf: Vec::with_capacity(256),
        }
    }

    /// Serializes `record` and appends it to the log file.
    ///
    /// On success the bytes have been handed to the operating system; with
    /// `sync = true` they have also been fsynced.
    pub fn append(&mut self, record: &Record) -> Result<(), WalError> {
        record.encode_into(&mut self.buf)?;

        if self.file.is_none() {
            self.file = Some(Self::create_file(&self.dir)?);
        }
        if let Some((_, file)) = self.file.as_mut() {
            file.write_all(&self.buf)?;
            if self.sync {
                file.sync_all()?;
            }
        }
        Ok(())
    }

    /// Forces everything written so far onto disk.
    pub fn sync(&mut self) -> Result<(), WalError> {
        if let Some((_, file)) = self.file.as_mut() {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Path of the backing file, once one exists.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Syncs, closes, and unlinks the log file.
    ///
    /// Only legal once the paired memtable has been durably written to a
    /// segment; the engine upholds that ordering.
    pub fn remove(mut self) -> Result<(), WalError> {
        if let Some((path, file)) = self.file.take() {
            file.sync_all()?;
            drop(file);
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Claims a fresh timestamp-named file in `dir`.
    ///
    /// `create_new` makes the claim atomic; if two tables rotate within
    /// the same second the later one bumps its stamp forward until a free
    /// name is found.
    fn create_file(dir: &Path) -> io::Result<(PathBuf, File)> {
        let mut stamp: DateTime<Local> = Local::now();
        loop {
            let path = dir.join(format!("{}.{}", stamp.format(NAME_FORMAT), WAL_EXT));
            match OpenOptions::new().create_new(true).append(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    stamp = stamp + Duration::seconds(1);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Sequential reader used by crash recovery.
///
/// Replay yields every complete record in order. A truncated trailing
/// record (crash mid-write) reads as a clean end of stream; a CRC mismatch
/// on a fully-written record is [`WalError::Corrupt`] and halts replay for
/// this file.
pub struct WalReader {
    rdr: BufReader<File>,
}

impl WalReader {
    /// Opens an existing WAL file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = File::open(path)?;
        Ok(Self {
            rdr: BufReader::new(file),
        })
    }

    /// Next record, or `None` at end of stream.
    pub fn read_record(&mut self) -> Result<Option<Record>, WalError> {
        Ok(Record::decode_from(&mut self.rdr)?)
    }
}

use sstable::SstError;
use std::io;
use thiserror::Error;
use wal::WalError;

/// Result alias used across the engine's public API.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The error taxonomy the engine surfaces to its callers (the network
/// front-end maps these onto protocol error replies).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A CRC mismatch or a truncation outside the trailing-write tolerance
    /// window, detected while reading a WAL or a segment block.
    #[error("corrupt record detected")]
    CorruptRecord,

    /// An underlying filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The record cannot be stored: its encoding exceeds one block slot
    /// (or the value does not fit its 16-bit length field).
    #[error("record of {size} bytes exceeds block capacity {capacity}")]
    TooLarge { size: usize, capacity: usize },

    /// The call arrived after `shutdown` began.
    #[error("engine is shutting down")]
    ShuttingDown,

    /// Keys must be 1..=255 bytes long.
    #[error("invalid key length {0} (keys are 1..=255 bytes)")]
    InvalidKey(usize),
}

impl From<WalError> for EngineError {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(io) => EngineError::Io(io),
            WalError::Corrupt => EngineError::CorruptRecord,
        }
    }
}

impl From<SstError> for EngineError {
    fn from(e: SstError) -> Self {
        match e {
            SstError::Io(io) => EngineError::Io(io),
            SstError::Corrupt => EngineError::CorruptRecord,
            SstError::TooLarge { size, capacity } => EngineError::TooLarge { size, capacity },
        }
    }
}

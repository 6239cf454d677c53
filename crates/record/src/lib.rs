//! # Record — shared wire codec
//!
//! The single on-disk record format used by the WAL, block, and segment
//! layers. One record carries a key, an optional value, and a tombstone
//! flag; the encoding is the durability contract of the store and must not
//! change between versions.
//!
//! ## Binary Record Format
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//! [ deleted  : u8  ]
//! [ crc32    : u32 ]      CRC-32 (IEEE) over key_bytes || value_bytes
//! [ key_len  : u8  ]      1..=255
//! [ key_bytes ]
//! [ value_len : u16 ]     present only when deleted == 0
//! [ value_bytes ]
//! ```
//!
//! A tombstone never stores value bytes; decoding a tombstone always yields
//! an empty value. Block slots are zero-padded, so a decoder that reads a
//! zero `key_len` (and the all-zero CRC that precedes it) has walked off
//! the packed records into padding and reports end-of-stream.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::io::{self, Read};

use thiserror::Error;

/// Smallest legal key length in bytes.
pub const MIN_KEY_LEN: usize = 1;
/// Largest legal key length in bytes (`key_len` is a u8).
pub const MAX_KEY_LEN: usize = u8::MAX as usize;
/// Largest legal value length in bytes (`value_len` is a u16).
pub const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Fixed per-record overhead: deleted flag + CRC + key_len.
const HEADER_LEN: usize = 1 + 4 + 1;

/// Errors produced by the record codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying I/O error (not a truncation; truncated trailing
    /// records are reported as end-of-stream).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A fully-read record failed CRC validation.
    #[error("crc mismatch while decoding record")]
    Corrupt,

    /// A field does not fit its wire representation (key length outside
    /// 1..=255 or value longer than 65535 bytes).
    #[error("record field out of range: {0}")]
    OutOfRange(&'static str),
}

/// A single logical record: key, value, tombstone flag.
///
/// The tombstone invariant is enforced at construction: a deleted record
/// carries an empty value no matter what the caller supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub tombstone: bool,
}

impl Record {
    /// A live key-value record.
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            tombstone: false,
        }
    }

    /// A tombstone for `key`. The value is always empty.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self {
            key,
            value: Vec::new(),
            tombstone: true,
        }
    }

    /// Number of bytes `encode_into` will produce for this record.
    pub fn encoded_len(&self) -> usize {
        if self.tombstone {
            HEADER_LEN + self.key.len()
        } else {
            HEADER_LEN + self.key.len() + 2 + self.value.len()
        }
    }

    /// Serializes the record into `buf`, clearing it first.
    ///
    /// The buffer is caller-owned so writers can reuse one allocation
    /// across appends.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        if self.key.len() < MIN_KEY_LEN || self.key.len() > MAX_KEY_LEN {
            return Err(CodecError::OutOfRange("key length"));
        }
        if self.value.len() > MAX_VALUE_LEN {
            return Err(CodecError::OutOfRange("value length"));
        }

        buf.clear();
        buf.reserve(self.encoded_len());

        buf.push(self.tombstone as u8);

        let mut hasher = Crc32::new();
        hasher.update(&self.key);
        if !self.tombstone {
            hasher.update(&self.value);
        }
        buf.write_u32::<BigEndian>(hasher.finalize())?;

        buf.push(self.key.len() as u8);
        buf.extend_from_slice(&self.key);

        if !self.tombstone {
            buf.write_u16::<BigEndian>(self.value.len() as u16)?;
            buf.extend_from_slice(&self.value);
        }

        Ok(())
    }

    /// Decodes the next record from `r`.
    ///
    /// # Termination
    ///
    /// - Clean EOF before the first byte -> `Ok(None)`.
    /// - Truncated trailing record (EOF mid-field, e.g. crash mid-write) ->
    ///   `Ok(None)`; every complete record before it has been yielded.
    /// - Zero `key_len` (block padding marker, preceded by a zero CRC) ->
    ///   `Ok(None)`.
    /// - CRC mismatch on a fully-read record -> `Err(CodecError::Corrupt)`.
    pub fn decode_from<R: Read>(r: &mut R) -> Result<Option<Record>, CodecError> {
        let mut flag = [0u8; 1];
        match r.read_exact(&mut flag) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        }
        let deleted = flag[0];

        let crc = match r.read_u32::<BigEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        };

        let key_len = match r.read_u8() {
            Ok(v) => v as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        };
        if key_len == 0 {
            // Padding: a record always has a non-empty key.
            return Ok(None);
        }

        let mut key = vec![0u8; key_len];
        match r.read_exact(&mut key) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(CodecError::Io(e)),
        }

        let mut value = Vec::new();
        if deleted == 0 {
            let value_len = match r.read_u16::<BigEndian>() {
                Ok(v) => v as usize,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(CodecError::Io(e)),
            };
            value.resize(value_len, 0);
            match r.read_exact(&mut value) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(CodecError::Io(e)),
            }
        }

        let mut hasher = Crc32::new();
        hasher.update(&key);
        hasher.update(&value);
        if hasher.finalize() != crc {
            return Err(CodecError::Corrupt);
        }

        Ok(Some(Record {
            key,
            value,
            tombstone: deleted == 1,
        }))
    }
}

#[cfg(test)]
mod tests;

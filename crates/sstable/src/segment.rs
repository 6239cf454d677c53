use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use record::Record;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::block::Block;
use crate::{RecordScanner, SstError, BLOCK_SIZE, SEGMENT_EXT, SIDECAR_EXT};

/// Path of a segment data file: `NNNNNN.seg`, six-digit zero-padded id.
pub(crate) fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{id:06}.{SEGMENT_EXT}"))
}

/// Path of the sidecar index paired with a segment: `NNNNNN.sp`.
pub(crate) fn sidecar_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{id:06}.{SIDECAR_EXT}"))
}

/// One immutable on-disk sorted file plus its sidecar block index.
///
/// The data file is a run of fixed-size block slots (block `N` starts at
/// byte `N * BLOCK_SIZE`); the sidecar lists each block's `min_key` and
/// `max_key` so a point lookup touches at most one block. Once written,
/// neither file changes again; the only mutation is deletion after a
/// merge.
pub struct Segment {
    id: u64,
    path: PathBuf,
    sidecar: PathBuf,
    file: Mutex<File>,
    size: u64,
    blocks: Vec<Block>,
}

impl Segment {
    /// Opens segment `id` in `dir` read-only and loads its sidecar.
    ///
    /// A missing or short sidecar entry is a fatal load error; a segment
    /// file shorter than its last full slot is fine (the final block is
    /// simply partial).
    pub fn open(dir: &Path, id: u64) -> Result<Self, SstError> {
        let path = segment_path(dir, id);
        let sidecar = sidecar_path(dir, id);

        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        let blocks = Self::load_sidecar(&sidecar)?;

        Ok(Self {
            id,
            path,
            sidecar,
            file: Mutex::new(file),
            size,
            blocks,
        })
    }

    fn load_sidecar(path: &Path) -> Result<Vec<Block>, SstError> {
        let mut rdr = BufReader::new(File::open(path)?);
        let mut blocks = Vec::new();
        let mut pos = 0u64;

        loop {
            // End of file between entries terminates the index; anything
            // shorter than a full entry is corruption.
            let min_len = match rdr.read_u32::<BigEndian>() {
                Ok(v) => v as usize,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(SstError::Io(e)),
            };
            let mut min_key = vec![0u8; min_len];
            rdr.read_exact(&mut min_key)?;

            let max_len = rdr.read_u32::<BigEndian>()? as usize;
            let mut max_key = vec![0u8; max_len];
            rdr.read_exact(&mut max_key)?;

            blocks.push(Block::new(pos, min_key, max_key));
            pos += BLOCK_SIZE as u64;
        }

        Ok(blocks)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// On-disk size of the data file in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Point lookup via the sidecar index.
    ///
    /// Binary-searches the block ranges; if no block brackets the key the
    /// segment answers without touching the data file. A segment with an
    /// empty sidecar never matches.
    pub fn get(&self, key: &[u8]) -> Result<Option<Record>, SstError> {
        let idx = self.blocks.partition_point(|b| b.max_key() < key);
        let Some(block) = self.blocks.get(idx) else {
            return Ok(None);
        };
        if key < block.min_key() {
            return Ok(None);
        }
        block.get(key, &self.file)
    }

    /// Ordered streaming read of every record, block by block.
    pub fn scanner(&self) -> SegmentScanner<'_> {
        SegmentScanner {
            segment: self,
            next_block: 0,
            current: None,
        }
    }

    /// Unlinks both files. The in-memory handle stays readable until
    /// dropped.
    pub(crate) fn delete_files(&self) -> Result<(), SstError> {
        fs::remove_file(&self.path)?;
        fs::remove_file(&self.sidecar)?;
        Ok(())
    }
}

/// Streams a segment's records in key order; the merge path drives two of
/// these through a two-way merge.
pub struct SegmentScanner<'a> {
    segment: &'a Segment,
    next_block: usize,
    current: Option<(Arc<Vec<Record>>, usize)>,
}

impl RecordScanner for SegmentScanner<'_> {
    fn next_record(&mut self) -> Result<Option<Record>, SstError> {
        loop {
            if let Some((chunks, idx)) = self.current.as_mut() {
                if let Some(rec) = chunks.get(*idx) {
                    *idx += 1;
                    return Ok(Some(rec.clone()));
                }
                self.current = None;
            }

            let Some(block) = self.segment.blocks.get(self.next_block) else {
                return Ok(None);
            };
            self.next_block += 1;
            let chunks = block.load(&self.segment.file)?;
            self.current = Some((chunks, 0));
        }
    }
}

/// Streaming writer for a fresh segment.
///
/// Records must arrive in ascending key order (the memtable scanner and
/// the merge both guarantee this). Data goes to `NNNNNN.seg.tmp` /
/// `NNNNNN.sp.tmp`; [`finish`](SegmentWriter::finish) fsyncs both and
/// renames them into place, sidecar first, so a crash can never leave a
/// live data file without its index.
pub(crate) struct SegmentWriter {
    id: u64,
    dir: PathBuf,
    tmp_path: PathBuf,
    file: BufWriter<File>,
    /// Encode scratch, reused across records.
    buf: Vec<u8>,
    /// Bytes written into the current block slot.
    block_used: usize,
    /// First key of the current block; `None` while the block is empty.
    block_min: Option<Vec<u8>>,
    /// Last key written to the current block.
    block_max: Vec<u8>,
    /// `(min_key, max_key)` of every finished block, in order.
    ranges: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SegmentWriter {
    pub(crate) fn create(dir: &Path, id: u64) -> Result<Self, SstError> {
        let tmp_path = segment_path(dir, id).with_extension(format!("{SEGMENT_EXT}.tmp"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        Ok(Self {
            id,
            dir: dir.to_path_buf(),
            tmp_path,
            file: BufWriter::new(file),
            buf: Vec::with_capacity(256),
            block_used: 0,
            block_min: None,
            block_max: Vec::new(),
            ranges: Vec::new(),
        })
    }

    /// Appends one record, rolling over to a fresh block slot when the
    /// current one cannot fit it.
    pub(crate) fn write(&mut self, record: &Record) -> Result<(), SstError> {
        record.encode_into(&mut self.buf)?;
        let len = self.buf.len();
        if len > BLOCK_SIZE {
            return Err(SstError::TooLarge {
                size: len,
                capacity: BLOCK_SIZE,
            });
        }

        if self.block_used + len > BLOCK_SIZE {
            self.close_block()?;
        }

        if self.block_min.is_none() {
            self.block_min = Some(record.key.clone());
        }
        self.block_max.clear();
        self.block_max.extend_from_slice(&record.key);

        self.file.write_all(&self.buf)?;
        self.block_used += len;
        Ok(())
    }

    /// Pads the current block to its slot boundary and records its range.
    fn close_block(&mut self) -> Result<(), SstError> {
        if let Some(min) = self.block_min.take() {
            let pad = (BLOCK_SIZE - self.block_used) as u64;
            io::copy(&mut io::repeat(0).take(pad), &mut self.file)?;
            self.ranges.push((min, std::mem::take(&mut self.block_max)));
            self.block_used = 0;
        }
        Ok(())
    }

    /// Seals the segment: final padding, sidecar, fsync, rename.
    ///
    /// Returns the segment reopened in read mode.
    pub(crate) fn finish(mut self) -> Result<Segment, SstError> {
        self.close_block()?;

        let file = self
            .file
            .into_inner()
            .map_err(|e| SstError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);

        let tmp_sidecar = sidecar_path(&self.dir, self.id).with_extension(format!("{SIDECAR_EXT}.tmp"));
        {
            let mut sc = BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&tmp_sidecar)?,
            );
            for (min, max) in &self.ranges {
                sc.write_u32::<BigEndian>(min.len() as u32)?;
                sc.write_all(min)?;
                sc.write_u32::<BigEndian>(max.len() as u32)?;
                sc.write_all(max)?;
            }
            let sc = sc.into_inner().map_err(|e| SstError::Io(e.into_error()))?;
            sc.sync_all()?;
        }

        fs::rename(&tmp_sidecar, sidecar_path(&self.dir, self.id))?;
        fs::rename(&self.tmp_path, segment_path(&self.dir, self.id))?;

        Segment::open(&self.dir, self.id)
    }
}

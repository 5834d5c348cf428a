//! Byte-range sharding of the input file
//!
//! Ranges are cut at approximately `size / workers` and then pushed forward
//! to the byte after the next line terminator, so no row is ever split
//! across two ranges.

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Half-open byte range `[start, end)` of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Split `path` into `workers` contiguous, line-aligned ranges.
///
/// The last range always ends at end-of-file. When no terminator follows an
/// approximate cut (the cut falls inside the final line), the boundary
/// falls back to end-of-file and the remaining ranges come back empty.
pub fn compute_chunks<P: AsRef<Path>>(path: P, workers: usize) -> Result<Vec<ChunkRange>> {
    let path = path.as_ref();
    if workers == 0 {
        return Err(anyhow!("worker count must be at least 1"));
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open source file '{}'", path.display()))?;
    let file_size = file
        .metadata()
        .with_context(|| format!("Failed to stat source file '{}'", path.display()))?
        .len();

    let chunk_size = file_size / workers as u64;
    let mut reader = BufReader::new(file);
    let mut ranges = Vec::with_capacity(workers);
    let mut scratch = Vec::new();

    let mut start = 0u64;
    for i in 0..workers {
        let end = if i == workers - 1 {
            file_size
        } else {
            let approx = (start + chunk_size).min(file_size);
            align_to_line_end(&mut reader, approx, file_size, &mut scratch)
                .with_context(|| format!("Failed to align chunk boundary at byte {}", approx))?
        };

        ranges.push(ChunkRange::new(start, end));
        start = end;
    }

    Ok(ranges)
}

/// Offset just past the first `\n` at or after `offset`, or `file_size`
/// when the rest of the file holds no terminator.
fn align_to_line_end<R: BufRead + Seek>(
    reader: &mut R,
    offset: u64,
    file_size: u64,
    scratch: &mut Vec<u8>,
) -> std::io::Result<u64> {
    if offset >= file_size {
        return Ok(file_size);
    }

    reader.seek(SeekFrom::Start(offset))?;
    scratch.clear();
    let consumed = reader.read_until(b'\n', scratch)? as u64;

    if scratch.last() == Some(&b'\n') {
        Ok(offset + consumed)
    } else {
        log::debug!(
            "No line terminator after byte {}, boundary falls back to end of file",
            offset
        );
        Ok(file_size)
    }
}

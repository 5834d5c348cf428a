use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Take};
use std::path::Path;

use crate::chunker::ChunkRange;
use crate::event::LogEntry;
use crate::platform::CancelToken;

/// Row accounting for one range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounters {
    pub rows_read: usize,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
}

/// Lazy record source over one byte range of the log file
///
/// Lines are read one at a time as the consumer pulls, so reading never runs
/// ahead of processing. Each line is parsed on its own, so a malformed row
/// (an unclosed quote included) never reaches into the next one. The file
/// handle lives exactly as long as the reader. Malformed rows are logged and
/// skipped; the cancellation token is checked before every read.
pub struct RangeReader {
    lines: Take<BufReader<File>>,
    line: Vec<u8>,
    offset: u64,
    range: ChunkRange,
    cancel: CancelToken,
    counters: SourceCounters,
    finished: bool,
}

impl RangeReader {
    pub fn open<P: AsRef<Path>>(path: P, range: ChunkRange, cancel: CancelToken) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open source file '{}'", path.display()))?;
        file.seek(SeekFrom::Start(range.start))
            .with_context(|| format!("Failed to seek to byte {}", range.start))?;

        let mut reader = Self {
            lines: BufReader::new(file).take(range.len()),
            line: Vec::new(),
            offset: range.start,
            range,
            cancel,
            counters: SourceCounters::default(),
            finished: false,
        };

        // Only the range at offset zero carries the header row
        if range.start == 0 && !range.is_empty() {
            reader
                .read_line()
                .with_context(|| format!("Failed to read header row of '{}'", path.display()))?;
        }

        Ok(reader)
    }

    pub fn range(&self) -> ChunkRange {
        self.range
    }

    pub fn counters(&self) -> SourceCounters {
        self.counters
    }

    /// Next raw line into `self.line`; returns the byte offset it started at,
    /// or `None` at the end of the range
    fn read_line(&mut self) -> std::io::Result<Option<u64>> {
        self.line.clear();
        let start = self.offset;
        let consumed = self.lines.read_until(b'\n', &mut self.line)?;
        if consumed == 0 {
            return Ok(None);
        }
        self.offset += consumed as u64;
        Ok(Some(start))
    }
}

/// Parse one line on its own with a fresh csv reader
fn parse_line(line: &[u8]) -> Result<LogEntry> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line);

    let mut record = StringRecord::new();
    if !reader
        .read_record(&mut record)
        .context("Failed to parse CSV data line")?
    {
        return Err(anyhow!("Empty CSV data line"));
    }
    LogEntry::from_record(&record)
}

/// Line without its `\n` / `\r\n` terminator
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Iterator for RangeReader {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            if self.finished {
                return None;
            }

            if self.cancel.is_cancelled() {
                log::debug!(
                    "Cancelled while reading range {}..{}",
                    self.range.start,
                    self.range.end
                );
                self.finished = true;
                return None;
            }

            let line_start = match self.read_line() {
                Ok(Some(start)) => start,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    log::error!(
                        "Failed to read range {}..{} at byte {}: {}",
                        self.range.start,
                        self.range.end,
                        self.offset,
                        e
                    );
                    self.finished = true;
                    return None;
                }
            };

            let line = strip_terminator(&self.line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            self.counters.rows_read += 1;
            match parse_line(line) {
                Ok(entry) => {
                    self.counters.rows_parsed += 1;
                    return Some(entry);
                }
                Err(e) => {
                    self.counters.rows_skipped += 1;
                    log::warn!(
                        "Failed to parse line at byte {}: {:#} (line: {:?})",
                        line_start,
                        e,
                        String::from_utf8_lossy(line)
                    );
                }
            }
        }
    }
}

impl Drop for RangeReader {
    fn drop(&mut self) {
        log::debug!(
            "Closed range {}..{}: {} rows read, {} parsed, {} skipped",
            self.range.start,
            self.range.end,
            self.counters.rows_read,
            self.counters.rows_parsed,
            self.counters.rows_skipped
        );
    }
}

//! Segmented log writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::LogError;
use crate::scanner::LogScanner;

/// Size of the record header (length + CRC32C).
pub(crate) const RECORD_HEADER_SIZE: u64 = 8;

/// Configuration for a segmented log.
#[derive(Debug, Clone)]
pub struct SegmentedLogConfig {
    /// Maximum size of a segment before the writer rolls to a new one.
    pub segment_size: u64,
}

impl Default for SegmentedLogConfig {
    fn default() -> Self {
        Self {
            segment_size: 128 * 1024 * 1024,
        }
    }
}

/// A segmented append-only record log.
///
/// Appends are framed as `[length: u32 LE][crc32c: u32 LE][payload]` and
/// synced to disk before returning, so a record that was acknowledged is
/// durable. The writer rolls to a fresh segment whenever the active one
/// would exceed the configured segment size.
pub struct SegmentedLog {
    dir: PathBuf,
    config: SegmentedLogConfig,
    /// `None` after `close()`.
    writer: Option<BufWriter<File>>,
    /// Identifier of the segment currently being appended to.
    active_segment: u64,
    /// Write position within the active segment.
    position: u64,
}

/// Formats a segment identifier as its on-disk file name.
fn segment_file_name(id: u64) -> String {
    format!("{id:08}")
}

/// Parses a segment identifier from a file name, ignoring foreign files.
fn parse_segment_id(name: &str) -> Option<u64> {
    if name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Lists segment identifiers present in `dir`, sorted ascending.
pub(crate) fn list_segments(dir: &Path) -> Result<Vec<u64>, LogError> {
    let mut ids = Vec::new();
    if !dir.exists() {
        return Ok(ids);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(id) = entry
            .file_name()
            .to_str()
            .and_then(parse_segment_id)
        {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

impl SegmentedLog {
    /// Opens a segmented log in `dir`, creating the directory if needed.
    ///
    /// Appends always go to a fresh segment (`last + 1`, or `0` for an
    /// empty directory), so a torn tail left behind by a crash is never
    /// appended to — it is dropped by the next scan instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or segment file cannot be created.
    pub fn open(dir: impl Into<PathBuf>, config: SegmentedLogConfig) -> Result<Self, LogError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let existing = list_segments(&dir)?;
        let active_segment = existing.last().map_or(0, |last| last + 1);

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(dir.join(segment_file_name(active_segment)))?;

        Ok(Self {
            dir,
            config,
            writer: Some(BufWriter::new(file)),
            active_segment,
            position: 0,
        })
    }

    /// Returns the directory this log lives in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically persists one record.
    ///
    /// The record is written, flushed, and fdatasynced before returning, so
    /// `Ok` means the record is durable.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Closed`] after `close()`, or an I/O error.
    pub fn append(&mut self, payload: &[u8]) -> Result<(), LogError> {
        let frame_len = RECORD_HEADER_SIZE + payload.len() as u64;
        if self.position > 0 && self.position + frame_len > self.config.segment_size {
            self.roll()?;
        }

        let writer = self.writer.as_mut().ok_or(LogError::Closed)?;

        #[allow(clippy::cast_possible_truncation)] // record payloads are far below u32::MAX
        let len = payload.len() as u32;
        let crc = crc32c::crc32c(payload);

        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&crc.to_le_bytes())?;
        writer.write_all(payload)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        self.position += frame_len;
        Ok(())
    }

    /// Returns the inclusive `(first, last)` segment identifier range
    /// currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn segments(&self) -> Result<(u64, u64), LogError> {
        let ids = list_segments(&self.dir)?;
        // The active segment always exists while the log is open.
        let first = ids.first().copied().unwrap_or(self.active_segment);
        let last = ids.last().copied().unwrap_or(self.active_segment);
        Ok((first, last))
    }

    /// Discards all segments with identifier strictly less than `upto`.
    ///
    /// Idempotent: identifiers at or below the current first are a no-op.
    /// The active segment is never removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment file cannot be removed.
    pub fn truncate(&mut self, upto: u64) -> Result<(), LogError> {
        for id in list_segments(&self.dir)? {
            if id >= upto || id == self.active_segment {
                continue;
            }
            std::fs::remove_file(self.dir.join(segment_file_name(id)))?;
            tracing::debug!(segment = id, dir = %self.dir.display(), "removed log segment");
        }
        Ok(())
    }

    /// Enumerates every record in `dir` in segment order.
    ///
    /// A torn or checksum-corrupt record at the tail of the final segment
    /// ends the scan cleanly; corruption anywhere else surfaces as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn scan(dir: impl AsRef<Path>) -> Result<LogScanner, LogError> {
        LogScanner::open(dir.as_ref())
    }

    /// Flushes pending writes and releases the file handle.
    ///
    /// Idempotent; appends after `close` fail with [`LogError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or sync fails.
    pub fn close(&mut self) -> Result<(), LogError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Rolls to a fresh segment, syncing the previous one first.
    fn roll(&mut self) -> Result<(), LogError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        self.active_segment += 1;
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(self.dir.join(segment_file_name(self.active_segment)))?;

        self.writer = Some(BufWriter::new(file));
        self.position = 0;
        tracing::debug!(
            segment = self.active_segment,
            dir = %self.dir.display(),
            "rolled to new log segment"
        );
        Ok(())
    }
}

impl std::fmt::Debug for SegmentedLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedLog")
            .field("dir", &self.dir)
            .field("active_segment", &self.active_segment)
            .field("position", &self.position)
            .field("closed", &self.writer.is_none())
            .finish()
    }
}

//! Lazy record scanner across segment files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::LogError;
use crate::segmented::{list_segments, RECORD_HEADER_SIZE};

/// Outcome of attempting to read one record from a segment.
enum ReadOutcome {
    Record(Vec<u8>),
    Eof,
    /// Torn write or checksum mismatch; scanning this segment stops here.
    Invalid {
        offset: u64,
        reason: String,
    },
}

/// Iterator over record payloads across all segments of a log directory.
///
/// Yields records in segment order. A torn or corrupt record in the final
/// segment ends the iteration cleanly (partial tail records are dropped);
/// the same condition in an earlier segment yields [`LogError::Corrupt`],
/// since data after it would otherwise be silently lost.
pub struct LogScanner {
    dir: PathBuf,
    /// Remaining segment ids, ascending; the head is the one being read.
    segments: Vec<u64>,
    index: usize,
    reader: Option<SegmentReader>,
}

struct SegmentReader {
    id: u64,
    reader: BufReader<File>,
    position: u64,
    file_len: u64,
}

impl SegmentReader {
    fn open(dir: &Path, id: u64) -> Result<Self, LogError> {
        let path = dir.join(format!("{id:08}"));
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            id,
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    fn read_next(&mut self) -> Result<ReadOutcome, LogError> {
        let remaining = self.file_len.saturating_sub(self.position);
        if remaining == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if remaining < RECORD_HEADER_SIZE {
            return Ok(ReadOutcome::Invalid {
                offset: self.position,
                reason: format!("incomplete header: {remaining} bytes remaining"),
            });
        }

        let record_start = self.position;

        let mut len_bytes = [0u8; 4];
        self.reader.read_exact(&mut len_bytes)?;
        let len = u64::from(u32::from_le_bytes(len_bytes));

        let mut crc_bytes = [0u8; 4];
        self.reader.read_exact(&mut crc_bytes)?;
        let expected_crc = u32::from_le_bytes(crc_bytes);
        self.position += RECORD_HEADER_SIZE;

        let data_remaining = self.file_len.saturating_sub(self.position);
        if data_remaining < len {
            return Ok(ReadOutcome::Invalid {
                offset: record_start,
                reason: format!("incomplete payload: {data_remaining} of {len} bytes"),
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let mut payload = vec![0u8; len as usize];
        self.reader.read_exact(&mut payload)?;
        self.position += len;

        let actual_crc = crc32c::crc32c(&payload);
        if actual_crc != expected_crc {
            return Ok(ReadOutcome::Invalid {
                offset: record_start,
                reason: format!("checksum mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
            });
        }

        Ok(ReadOutcome::Record(payload))
    }
}

impl LogScanner {
    /// Opens a scanner over every segment in `dir`.
    ///
    /// An empty or missing directory yields an empty iteration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory listing fails.
    pub fn open(dir: &Path) -> Result<Self, LogError> {
        let segments = list_segments(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            segments,
            index: 0,
            reader: None,
        })
    }

    fn is_final_segment(&self) -> bool {
        self.index + 1 >= self.segments.len()
    }
}

impl Iterator for LogScanner {
    type Item = Result<Vec<u8>, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.reader.is_none() {
                let id = *self.segments.get(self.index)?;
                match SegmentReader::open(&self.dir, id) {
                    Ok(reader) => self.reader = Some(reader),
                    Err(e) => return Some(Err(e)),
                }
            }

            let reader = self.reader.as_mut().expect("reader just set");
            match reader.read_next() {
                Ok(ReadOutcome::Record(payload)) => return Some(Ok(payload)),
                Ok(ReadOutcome::Eof) => {
                    self.reader = None;
                    self.index += 1;
                }
                Ok(ReadOutcome::Invalid { offset, reason }) => {
                    let segment = reader.id;
                    if self.is_final_segment() {
                        // Partial tail from a crash: drop it and stop cleanly.
                        tracing::debug!(segment, offset, reason, "dropping torn tail record");
                        self.reader = None;
                        self.index = self.segments.len();
                        return None;
                    }
                    self.reader = None;
                    self.index = self.segments.len();
                    return Some(Err(LogError::Corrupt {
                        segment,
                        offset,
                        reason,
                    }));
                }
                Err(e) => {
                    self.reader = None;
                    self.index = self.segments.len();
                    return Some(Err(e));
                }
            }
        }
    }
}

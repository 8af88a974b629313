//! In-memory sample chunks.
//!
//! A series stores its samples as a list of [`Chunk`]s, each a contiguous
//! time-ordered block of at most [`CHUNK_CAPACITY`] samples. Chunks convert
//! to and from the codec-stable [`WireChunk`] representation when the
//! checkpointer snapshots a series.

use crate::record::WireChunk;

/// Maximum number of samples per chunk.
pub const CHUNK_CAPACITY: usize = 120;

/// Encoding tag for the little-endian `(i64, f64)` pair payload.
const ENCODING_RAW_LE: u32 = 0;

/// Bytes per encoded sample: 8 for the timestamp, 8 for the value.
const SAMPLE_WIDTH: usize = 16;

/// A single timestamped value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePair {
    /// Timestamp in unix milliseconds.
    pub timestamp_ms: i64,
    /// Sample value.
    pub value: f64,
}

/// Errors from chunk operations.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// A sample arrived with a timestamp older than the chunk tail.
    #[error("out-of-order sample: {timestamp_ms} <= last {last_ms}")]
    OutOfOrder {
        /// Timestamp of the rejected sample.
        timestamp_ms: i64,
        /// Timestamp of the current last sample.
        last_ms: i64,
    },

    /// A sample arrived with a timestamp equal to the chunk tail.
    #[error("duplicate sample at {timestamp_ms}")]
    Duplicate {
        /// The duplicated timestamp.
        timestamp_ms: i64,
    },

    /// A wire chunk could not be decoded.
    #[error("malformed wire chunk: {0}")]
    Malformed(String),

    /// A wire chunk used an encoding this build does not understand.
    #[error("unsupported chunk encoding {0}")]
    UnsupportedEncoding(u32),
}

/// A contiguous, time-ordered block of samples for a single series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    samples: Vec<SamplePair>,
}

impl Chunk {
    /// Creates an empty chunk.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    /// Appends a sample, enforcing strict timestamp ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfOrder`] or [`ChunkError::Duplicate`] if
    /// the timestamp does not advance past the current tail.
    pub fn push(&mut self, sample: SamplePair) -> Result<(), ChunkError> {
        if let Some(last) = self.samples.last() {
            if sample.timestamp_ms == last.timestamp_ms {
                return Err(ChunkError::Duplicate {
                    timestamp_ms: sample.timestamp_ms,
                });
            }
            if sample.timestamp_ms < last.timestamp_ms {
                return Err(ChunkError::OutOfOrder {
                    timestamp_ms: sample.timestamp_ms,
                    last_ms: last.timestamp_ms,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Returns whether the chunk has reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= CHUNK_CAPACITY
    }

    /// Returns whether the chunk holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the number of samples in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Timestamp of the first sample, if any.
    #[must_use]
    pub fn first_time_ms(&self) -> Option<i64> {
        self.samples.first().map(|s| s.timestamp_ms)
    }

    /// Timestamp of the last sample, if any.
    #[must_use]
    pub fn last_time_ms(&self) -> Option<i64> {
        self.samples.last().map(|s| s.timestamp_ms)
    }

    /// The samples in timestamp order.
    #[must_use]
    pub fn samples(&self) -> &[SamplePair] {
        &self.samples
    }

    /// Encodes the chunk into its wire representation.
    #[must_use]
    pub fn to_wire(&self) -> WireChunk {
        let mut data = Vec::with_capacity(self.samples.len() * SAMPLE_WIDTH);
        for sample in &self.samples {
            data.extend_from_slice(&sample.timestamp_ms.to_le_bytes());
            data.extend_from_slice(&sample.value.to_le_bytes());
        }
        WireChunk {
            first_time_ms: self.first_time_ms().unwrap_or(0),
            last_time_ms: self.last_time_ms().unwrap_or(0),
            encoding: ENCODING_RAW_LE,
            data,
        }
    }

    /// Decodes a wire chunk back into its in-memory form.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::UnsupportedEncoding`] for unknown encodings and
    /// [`ChunkError::Malformed`] if the payload length is not a whole number
    /// of samples.
    pub fn from_wire(wire: &WireChunk) -> Result<Self, ChunkError> {
        if wire.encoding != ENCODING_RAW_LE {
            return Err(ChunkError::UnsupportedEncoding(wire.encoding));
        }
        if wire.data.len() % SAMPLE_WIDTH != 0 {
            return Err(ChunkError::Malformed(format!(
                "payload length {} is not a multiple of {SAMPLE_WIDTH}",
                wire.data.len()
            )));
        }

        let mut samples = Vec::with_capacity(wire.data.len() / SAMPLE_WIDTH);
        for window in wire.data.chunks_exact(SAMPLE_WIDTH) {
            let timestamp_ms = i64::from_le_bytes(window[..8].try_into().expect("8-byte slice"));
            let value = f64::from_le_bytes(window[8..].try_into().expect("8-byte slice"));
            samples.push(SamplePair {
                timestamp_ms,
                value,
            });
        }
        Ok(Self { samples })
    }
}

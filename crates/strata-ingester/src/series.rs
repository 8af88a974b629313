//! A single in-memory series.

use strata_model::{Chunk, ChunkError, LabelSet, SamplePair, WireChunk};

/// One live series: its label set and its chunked samples.
///
/// The struct itself is unsynchronized; callers hold the per-series lock
/// (see [`crate::state`]) for the duration of any access.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySeries {
    labels: LabelSet,
    chunks: Vec<Chunk>,
}

impl MemorySeries {
    /// Creates an empty series with the given labels.
    #[must_use]
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            chunks: Vec::new(),
        }
    }

    /// The series' label set.
    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Appends a sample, cutting a new chunk when the head chunk is full.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::OutOfOrder`] or [`ChunkError::Duplicate`] if
    /// the sample does not advance past the newest stored timestamp.
    pub fn append(&mut self, sample: SamplePair) -> Result<(), ChunkError> {
        // Ordering is enforced against the series tail, not just the head
        // chunk, so a new chunk cannot reopen an older time range.
        if let Some(last_ms) = self.last_time_ms() {
            if sample.timestamp_ms == last_ms {
                return Err(ChunkError::Duplicate {
                    timestamp_ms: sample.timestamp_ms,
                });
            }
            if sample.timestamp_ms < last_ms {
                return Err(ChunkError::OutOfOrder {
                    timestamp_ms: sample.timestamp_ms,
                    last_ms,
                });
            }
        }

        if self.chunks.last().map_or(true, Chunk::is_full) {
            self.chunks.push(Chunk::new());
        }
        self.chunks
            .last_mut()
            .expect("head chunk just ensured")
            .push(sample)
    }

    /// Converts the chunk list to its wire representation.
    #[must_use]
    pub fn wire_chunks(&self) -> Vec<WireChunk> {
        self.chunks.iter().map(Chunk::to_wire).collect()
    }

    /// Replaces the chunk list, used when installing a recovered snapshot.
    pub fn set_chunks(&mut self, chunks: Vec<Chunk>) {
        self.chunks = chunks;
    }

    /// The chunks in time order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Timestamp of the newest stored sample, if any.
    #[must_use]
    pub fn last_time_ms(&self) -> Option<i64> {
        self.chunks.iter().rev().find_map(Chunk::last_time_ms)
    }

    /// Total number of stored samples.
    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

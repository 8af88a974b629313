//! Error types for segmented log operations.

/// Errors that can occur while appending to or scanning a segmented log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// IO error during log operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A record failed its checksum or was cut short in a non-final segment.
    #[error("corrupt record in segment {segment} at offset {offset}: {reason}")]
    Corrupt {
        /// Segment identifier containing the bad record.
        segment: u64,
        /// Byte offset of the record start within the segment.
        offset: u64,
        /// What was wrong with the record.
        reason: String,
    },

    /// The log has been closed; no further appends are accepted.
    #[error("log is closed")]
    Closed,
}

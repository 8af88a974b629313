//! # StrataDB Model
//!
//! Core data model shared by the ingester and the query frontend: label
//! sets and their fingerprints, in-memory sample chunks, and the
//! tag-numbered wire codec for WAL records and series snapshots.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// Label sets and fingerprints - series identity
pub mod labels;

/// In-memory sample chunks - time-aligned blocks for a single series
pub mod chunk;

/// Wire codec - length-delimited, tag-numbered records and snapshots
pub mod record;

pub use chunk::{Chunk, ChunkError, SamplePair, CHUNK_CAPACITY};
pub use labels::{Fingerprint, Label, LabelSet};
pub use record::{LabelPair, RecordSample, SeriesDeclaration, SeriesSnapshot, WalRecord, WireChunk};

//! # StrataDB Frontend
//!
//! Query-range middleware: parses range queries at the HTTP boundary,
//! splits them into day-aligned sub-queries, dispatches the sub-queries
//! concurrently to a downstream executor under a cancellable scope, and
//! merges the partial results back into one ordered response.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// HTTP boundary codec for range requests
pub mod codec;

/// Error taxonomy for the frontend
pub mod error;

/// Fan-out execution of sub-queries
pub mod fanout;

/// Merging of partial responses
pub mod merge;

/// Day-aligned query splitting
pub mod split;

/// Request and response types, including the JSON envelope
pub mod types;

pub use codec::parse_query_range_request;
pub use error::FrontendError;
pub use fanout::{QueryRangeHandler, SplitByDay};
pub use merge::merge_responses;
pub use split::{next_day_boundary, split_query, MILLIS_PER_DAY};
pub use types::{
    ApiResponse, QueryRangeData, QueryRangeRequest, SamplePoint, SampleStream, VectorSample,
    STATUS_ERROR, STATUS_SUCCESS,
};

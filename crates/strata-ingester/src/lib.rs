//! # StrataDB Ingester
//!
//! Durability core of the ingester: live series state, the write-ahead-log
//! facade, the background checkpointer, and startup recovery.
//!
//! Every mutation accepted into the in-memory series state is logged to the
//! sample log first; a background pass periodically snapshots all live
//! series into the checkpoint log and discards superseded sample segments,
//! bounding recovery time.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// WAL engine configuration
pub mod config;

/// Ingestion entry point over state + WAL
pub mod ingester;

/// Observability counters for the WAL engine
pub mod metrics;

/// Startup recovery from the on-disk logs
pub mod recovery;

/// A single in-memory series
pub mod series;

/// Live series state shared across tenants
pub mod state;

/// WAL facade and checkpointer
pub mod wal;

pub use config::WalConfig;
pub use ingester::{Ingester, IngestError};
pub use metrics::{WalCounters, WalCountersSnapshot};
pub use recovery::{recover, RecoveryError};
pub use series::MemorySeries;
pub use state::{SeriesHandle, TenantState, TenantStates};
pub use wal::{Wal, WalError};

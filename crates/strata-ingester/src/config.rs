//! Configuration for the WAL engine.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the write-ahead log engine.
#[derive(Debug, Clone)]
pub struct WalConfig {
    /// Master toggle; when false the facade is inert and owns no files.
    pub enabled: bool,
    /// Run recovery from the on-disk logs on startup, before the
    /// background loop starts.
    pub recover: bool,
    /// Parent directory; `samples/` and `checkpoints/` subdirectories are
    /// created and owned by the engine.
    pub dir: PathBuf,
    /// Target wall-clock duration for one full checkpoint pass. Per-series
    /// pacing scales with the live series count.
    pub checkpoint_duration: Duration,
    /// Segment size for both logs.
    pub segment_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            recover: false,
            dir: PathBuf::from("wal"),
            checkpoint_duration: Duration::from_secs(60 * 60),
            segment_size: 128 * 1024 * 1024,
        }
    }
}

impl WalConfig {
    /// Directory of the sample log.
    #[must_use]
    pub fn samples_dir(&self) -> PathBuf {
        self.dir.join("samples")
    }

    /// Directory of the checkpoint log.
    #[must_use]
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.dir.join("checkpoints")
    }
}

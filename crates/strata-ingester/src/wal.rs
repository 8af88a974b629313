//! WAL facade and checkpointer.
//!
//! [`Wal`] is the polymorphic entry point: a disabled variant whose
//! operations are no-ops, and an enabled variant that appends every
//! [`WalRecord`] to the sample log synchronously and runs a background
//! checkpointer on a dedicated thread.
//!
//! One checkpoint pass walks every live series, writes a
//! [`SeriesSnapshot`] per series into the checkpoint log paced over the
//! configured window, then truncates the checkpoint log up to the segment
//! remembered from the previous pass. Sample-log truncation runs after
//! each pass symmetrically, which is what bounds recovery time.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use parking_lot::{Mutex, RwLock};
use prost::Message;
use strata_model::{SeriesSnapshot, WalRecord};
use strata_storage::{LogError, SegmentedLog, SegmentedLogConfig};

use crate::config::WalConfig;
use crate::metrics::{WalCounters, WalCountersSnapshot};
use crate::recovery::{self, RecoveryError};
use crate::state::TenantStates;

/// How long an empty pass parks on the quit channel before retrying.
const IDLE_PAUSE: Duration = Duration::from_secs(1);

/// Errors from WAL operations.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    /// Segmented log failure; on the append path this is a durability
    /// failure and the caller must refuse the write.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// Recovery failed during startup.
    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    /// The checkpointer thread could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The write-ahead log facade.
///
/// The enabled/disabled split is a closed set of variants; callers
/// dispatch through [`log`](Self::log) and [`stop`](Self::stop) without
/// inspecting which one they hold.
pub enum Wal {
    /// Inert variant: `log` and `stop` are no-ops, no files are created.
    Disabled,
    /// Active engine with background checkpointing.
    Enabled(WalEngine),
}

impl Wal {
    /// Opens the WAL according to `config`.
    ///
    /// When enabled this creates the `samples/` and `checkpoints/` logs,
    /// optionally runs recovery (swapping the recovered state into
    /// `states`), and starts the checkpointer thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs cannot be opened, recovery fails, or
    /// the background thread cannot be spawned.
    pub fn open(config: WalConfig, states: Arc<RwLock<TenantStates>>) -> Result<Self, WalError> {
        if !config.enabled {
            return Ok(Self::Disabled);
        }
        Ok(Self::Enabled(WalEngine::start(config, states)?))
    }

    /// Serializes a record and appends it to the sample log.
    ///
    /// A no-op when disabled.
    ///
    /// # Errors
    ///
    /// Returns a durability failure; the ingester must refuse the write
    /// upstream when this is not `Ok`.
    pub fn log(&self, record: &WalRecord) -> Result<(), WalError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Enabled(engine) => engine.log(record),
        }
    }

    /// Signals the background loop, waits for it, then closes both logs.
    ///
    /// Idempotent; a second call is a no-op. A no-op when disabled.
    pub fn stop(&self) {
        match self {
            Self::Disabled => {}
            Self::Enabled(engine) => engine.stop(),
        }
    }

    /// Snapshot of the engine counters (zeros when disabled).
    #[must_use]
    pub fn counters(&self) -> WalCountersSnapshot {
        match self {
            Self::Disabled => WalCountersSnapshot::default(),
            Self::Enabled(engine) => engine.counters.snapshot(),
        }
    }
}

/// The enabled WAL engine.
pub struct WalEngine {
    samples: Arc<Mutex<SegmentedLog>>,
    checkpoints: Arc<Mutex<SegmentedLog>>,
    /// Dropping the sender is the shutdown signal; `None` once stopped.
    quit: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WalCounters>,
}

impl WalEngine {
    fn start(config: WalConfig, states: Arc<RwLock<TenantStates>>) -> Result<Self, WalError> {
        let log_config = SegmentedLogConfig {
            segment_size: config.segment_size,
        };
        let samples = Arc::new(Mutex::new(SegmentedLog::open(
            config.samples_dir(),
            log_config.clone(),
        )?));
        let checkpoints = Arc::new(Mutex::new(SegmentedLog::open(
            config.checkpoints_dir(),
            log_config,
        )?));

        if config.recover {
            let fresh = recovery::recover(&config.dir)?;
            tracing::info!(
                series = fresh.num_series(),
                dir = %config.dir.display(),
                "recovered series state from WAL"
            );
            // Hold the state lock only for the swap; replay happened on
            // the isolated fresh state. Recovery runs before ingestion is
            // admitted, so nothing accepted concurrently is discarded.
            *states.write() = fresh;
        }

        let (quit_tx, quit_rx) = crossbeam_channel::bounded::<()>(0);
        let counters = Arc::new(WalCounters::new());

        let mut pass = CheckpointLoop {
            checkpoint_duration: config.checkpoint_duration,
            states,
            samples: Arc::clone(&samples),
            checkpoints: Arc::clone(&checkpoints),
            quit: quit_rx,
            counters: Arc::clone(&counters),
            last_checkpoint_segment: 0,
            last_samples_segment: 0,
        };
        let handle = std::thread::Builder::new()
            .name("wal-checkpointer".into())
            .spawn(move || pass.run())?;

        Ok(Self {
            samples,
            checkpoints,
            quit: Mutex::new(Some(quit_tx)),
            handle: Mutex::new(Some(handle)),
            counters,
        })
    }

    fn log(&self, record: &WalRecord) -> Result<(), WalError> {
        let buf = record.encode_to_vec();
        self.samples.lock().append(&buf)?;
        self.counters.records_logged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) {
        // Dropping the sender disconnects the quit channel, which the loop
        // observes both between passes and inside the pacing wait.
        drop(self.quit.lock().take());

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            tracing::error!("checkpointer thread panicked");
        }

        if let Err(e) = self.samples.lock().close() {
            tracing::error!(error = %e, "error closing sample log");
        }
        if let Err(e) = self.checkpoints.lock().close() {
            tracing::error!(error = %e, "error closing checkpoint log");
        }
    }
}

/// State owned by the checkpointer thread.
struct CheckpointLoop {
    checkpoint_duration: Duration,
    states: Arc<RwLock<TenantStates>>,
    samples: Arc<Mutex<SegmentedLog>>,
    checkpoints: Arc<Mutex<SegmentedLog>>,
    quit: Receiver<()>,
    counters: Arc<WalCounters>,
    /// Last segment of the checkpoint log observed by the previous pass.
    last_checkpoint_segment: u64,
    /// Last segment of the sample log observed by the previous pass.
    last_samples_segment: u64,
}

impl CheckpointLoop {
    fn run(&mut self) {
        while !self.is_stopped() {
            let checkpointed = match self.checkpoint() {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(error = %e, "error checkpointing series");
                    self.counters.checkpoints_failed.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            if let Err(e) = self.truncate_samples() {
                tracing::error!(error = %e, "error truncating sample log");
                self.counters.checkpoints_failed.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            if checkpointed == 0 {
                // Nothing live: park briefly so an idle ingester does not
                // spin. Shutdown disconnects the channel and interrupts
                // the pause immediately.
                let _ = self.quit.recv_timeout(IDLE_PAUSE);
            }
        }
        tracing::debug!("checkpointer loop exiting");
    }

    fn is_stopped(&self) -> bool {
        matches!(self.quit.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Runs one checkpoint pass; returns the number of series snapshotted.
    ///
    /// With zero live series this returns immediately without appending or
    /// truncating anything.
    fn checkpoint(&mut self) -> Result<usize, WalError> {
        let handles = self.states.read().series_handles();
        let num_series = handles.len();
        if num_series == 0 {
            return Ok(0);
        }

        // Pace the pass so one full walk takes roughly checkpoint_duration.
        let per_series =
            self.checkpoint_duration / u32::try_from(num_series).unwrap_or(u32::MAX);
        let ticker = crossbeam_channel::tick(per_series);

        for handle in handles {
            {
                let series = handle.series.lock();
                let snapshot = SeriesSnapshot {
                    tenant_id: handle.tenant.clone(),
                    fingerprint: handle.fingerprint.0,
                    labels: series.labels().into(),
                    chunks: series.wire_chunks(),
                };
                let buf = snapshot.encode_to_vec();
                // The per-fingerprint lock stays held across the append:
                // the snapshot must reflect everything written to memory
                // before the lock was acquired.
                self.checkpoints.lock().append(&buf)?;
            }
            self.counters
                .series_checkpointed
                .fetch_add(1, Ordering::Relaxed);

            select! {
                recv(ticker) -> _ => {}
                // On shutdown the wait falls through so the pass finishes
                // as fast as possible.
                recv(self.quit) -> _ => {}
            }
        }

        // Remove the previous checkpoint.
        let (_, last) = self.checkpoints.lock().segments()?;
        self.checkpoints.lock().truncate(self.last_checkpoint_segment)?;
        self.last_checkpoint_segment = last;

        self.counters
            .checkpoints_completed
            .fetch_add(1, Ordering::Relaxed);
        Ok(num_series)
    }

    /// Discards sample segments from before the previous pass.
    fn truncate_samples(&mut self) -> Result<(), WalError> {
        let (_, last) = self.samples.lock().segments()?;
        self.samples.lock().truncate(self.last_samples_segment)?;
        self.last_samples_segment = last;
        Ok(())
    }
}

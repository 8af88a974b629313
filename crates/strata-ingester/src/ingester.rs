//! Ingestion entry point over the live state and the WAL facade.

use std::sync::Arc;

use parking_lot::RwLock;
use strata_model::{ChunkError, Fingerprint, LabelSet, RecordSample, SamplePair, SeriesDeclaration, WalRecord};

use crate::config::WalConfig;
use crate::state::TenantStates;
use crate::wal::{Wal, WalError};

/// Errors from pushing samples into the ingester.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The sample log append failed; nothing was applied to memory and the
    /// write must be refused upstream.
    #[error("durability failure: {0}")]
    Durability(#[from] WalError),

    /// A sample was rejected by its series after the batch was durable.
    #[error("sample rejected: {0}")]
    Sample(#[from] ChunkError),
}

/// The ingester: live series state plus its write-ahead log.
pub struct Ingester {
    states: Arc<RwLock<TenantStates>>,
    wal: Wal,
}

impl Ingester {
    /// Opens an ingester with the given WAL configuration.
    ///
    /// When `config.recover` is set, state is rebuilt from the on-disk
    /// logs before any writes are admitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAL cannot be opened or recovery fails.
    pub fn open(config: WalConfig) -> Result<Self, WalError> {
        let states = Arc::new(RwLock::new(TenantStates::new()));
        let wal = Wal::open(config, Arc::clone(&states))?;
        Ok(Self { states, wal })
    }

    /// Pushes a batch of samples for one tenant.
    ///
    /// The batch is made durable in the sample log *before* any in-memory
    /// mutation: declarations for previously unseen series are recorded
    /// alongside the samples, and a log failure refuses the entire write.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Durability`] if the WAL append fails, or the
    /// first per-sample rejection (out-of-order, duplicate) after the
    /// batch was logged.
    pub fn push(
        &self,
        tenant: &str,
        batch: Vec<(LabelSet, SamplePair)>,
    ) -> Result<(), IngestError> {
        let mut record = WalRecord {
            tenant_id: tenant.to_string(),
            series: Vec::new(),
            samples: Vec::with_capacity(batch.len()),
        };
        let mut resolved: Vec<(Fingerprint, LabelSet, SamplePair)> =
            Vec::with_capacity(batch.len());

        {
            let states = self.states.read();
            let mut declared: Vec<Fingerprint> = Vec::new();
            for (labels, sample) in batch {
                let fingerprint = labels.fingerprint();
                if states.get_series(tenant, fingerprint).is_none()
                    && !declared.contains(&fingerprint)
                {
                    declared.push(fingerprint);
                    record.series.push(SeriesDeclaration {
                        fingerprint: fingerprint.0,
                        labels: (&labels).into(),
                    });
                }
                record.samples.push(RecordSample {
                    fingerprint: fingerprint.0,
                    timestamp_ms: sample.timestamp_ms,
                    value: sample.value,
                });
                resolved.push((fingerprint, labels, sample));
            }
        }

        // Durability before mutation.
        self.wal.log(&record)?;

        let mut first_rejection: Option<ChunkError> = None;
        {
            let mut states = self.states.write();
            for (fingerprint, labels, sample) in resolved {
                let series = states.get_or_create_series(tenant, fingerprint, &labels);
                let result = series.lock().append(sample);
                if let Err(e) = result {
                    tracing::debug!(
                        tenant,
                        fingerprint = %fingerprint,
                        error = %e,
                        "sample rejected by series"
                    );
                    first_rejection.get_or_insert(e);
                }
            }
        }

        match first_rejection {
            Some(e) => Err(IngestError::Sample(e)),
            None => Ok(()),
        }
    }

    /// Shared handle to the live series state.
    #[must_use]
    pub fn states(&self) -> &Arc<RwLock<TenantStates>> {
        &self.states
    }

    /// The WAL facade.
    #[must_use]
    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// Stops the WAL engine; further pushes will fail when enabled.
    pub fn shutdown(&self) {
        self.wal.stop();
    }
}

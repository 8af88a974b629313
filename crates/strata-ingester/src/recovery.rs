//! Startup recovery from the on-disk logs.
//!
//! Recovery reconstructs the live series state deterministically: first the
//! checkpoint log is replayed (one snapshot per series, later duplicates
//! winning), then the sample log extends it with everything written after
//! the checkpoint was captured. The fresh state is built in isolation, so
//! no locking is needed until the caller swaps it in.

use std::path::Path;

use prost::Message;
use strata_model::{Chunk, ChunkError, Fingerprint, LabelSet, SamplePair, SeriesSnapshot, WalRecord};
use strata_storage::{LogError, SegmentedLog};

use crate::state::TenantStates;

/// Errors that abort recovery. These are fatal: the ingester must not
/// start on a partially replayed state.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Log scan failure (I/O or mid-log corruption).
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// A record or snapshot could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A snapshot carried a wire chunk this build cannot decode.
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),
}

/// Rebuilds series state from `<dir>/checkpoints` then `<dir>/samples`.
///
/// The returned state is fresh and isolated; the caller swaps it into the
/// running ingester under its state lock.
///
/// # Errors
///
/// Returns [`RecoveryError`] on scan or decode failure. Per-sample append
/// failures during sample replay are logged at info level and skipped.
pub fn recover(dir: &Path) -> Result<TenantStates, RecoveryError> {
    let mut states = TenantStates::new();
    replay_checkpoints(&dir.join("checkpoints"), &mut states)?;
    replay_samples(&dir.join("samples"), &mut states)?;
    Ok(states)
}

/// Phase A: install one series per snapshot, chunks taken verbatim.
fn replay_checkpoints(dir: &Path, states: &mut TenantStates) -> Result<(), RecoveryError> {
    let mut replayed = 0usize;
    for payload in SegmentedLog::scan(dir)? {
        let snapshot = SeriesSnapshot::decode(payload?.as_slice())?;
        let labels: LabelSet = snapshot.labels.as_slice().into();
        let chunks = snapshot
            .chunks
            .iter()
            .map(Chunk::from_wire)
            .collect::<Result<Vec<_>, _>>()?;

        // Duplicate (tenant, fingerprint) entries can occur when an
        // aborted pass precedes the final one; the later entry wins.
        states.install_series(
            &snapshot.tenant_id,
            Fingerprint(snapshot.fingerprint),
            labels,
            chunks,
        );
        replayed += 1;
    }
    tracing::info!(snapshots = replayed, "replayed checkpoint log");
    Ok(())
}

/// Phase B: create series from declarations, then append samples.
fn replay_samples(dir: &Path, states: &mut TenantStates) -> Result<(), RecoveryError> {
    let mut records = 0usize;
    for payload in SegmentedLog::scan(dir)? {
        let record = WalRecord::decode(payload?.as_slice())?;
        records += 1;

        for declaration in &record.series {
            let fingerprint = Fingerprint(declaration.fingerprint);
            if states.get_series(&record.tenant_id, fingerprint).is_none() {
                let labels: LabelSet = declaration.labels.as_slice().into();
                states.get_or_create_series(&record.tenant_id, fingerprint, &labels);
            }
        }

        for sample in &record.samples {
            let fingerprint = Fingerprint(sample.fingerprint);
            let Some(series) = states.get_series(&record.tenant_id, fingerprint) else {
                // The owning record likely predates the checkpoint whose
                // snapshot already covers this sample; skip it silently.
                continue;
            };
            let result = series.lock().append(SamplePair {
                timestamp_ms: sample.timestamp_ms,
                value: sample.value,
            });
            if let Err(e) = result {
                tracing::info!(
                    tenant = %record.tenant_id,
                    fingerprint = %fingerprint,
                    error = %e,
                    "error appending sample during replay"
                );
            }
        }
    }
    tracing::info!(records, "replayed sample log");
    Ok(())
}

//! Live series state shared across tenants.
//!
//! The maps themselves are guarded by the ingester's outer `RwLock`; each
//! series additionally carries its own `parking_lot::Mutex`, which is the
//! per-fingerprint lock capability: it must be held while a series is read
//! for checkpointing or mutated by an append. Iteration yields stable
//! `Arc` handles, so a checkpoint pass never holds the outer lock while it
//! walks series.

use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;
use strata_model::{Chunk, Fingerprint, LabelSet};

use crate::series::MemorySeries;

/// Tenant identifier.
pub type TenantId = String;

/// A stable handle to one live series, yielded by iteration.
#[derive(Clone)]
pub struct SeriesHandle {
    /// Owning tenant.
    pub tenant: TenantId,
    /// Fingerprint of the series.
    pub fingerprint: Fingerprint,
    /// The series; lock it for any access.
    pub series: Arc<Mutex<MemorySeries>>,
}

/// Per-tenant series map.
#[derive(Debug, Default)]
pub struct TenantState {
    series: FxHashMap<Fingerprint, Arc<Mutex<MemorySeries>>>,
}

impl TenantState {
    /// Looks up a series by fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: Fingerprint) -> Option<Arc<Mutex<MemorySeries>>> {
        self.series.get(&fingerprint).cloned()
    }

    /// Number of live series for this tenant.
    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the tenant has no live series.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// All live series, keyed by tenant then fingerprint.
#[derive(Debug, Default)]
pub struct TenantStates {
    tenants: FxHashMap<TenantId, TenantState>,
}

impl TenantStates {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of live series across all tenants.
    #[must_use]
    pub fn num_series(&self) -> usize {
        self.tenants.values().map(TenantState::len).sum()
    }

    /// Looks up a series by tenant and fingerprint.
    #[must_use]
    pub fn get_series(
        &self,
        tenant: &str,
        fingerprint: Fingerprint,
    ) -> Option<Arc<Mutex<MemorySeries>>> {
        self.tenants.get(tenant)?.get(fingerprint)
    }

    /// Creates a series if absent and returns its handle.
    pub fn get_or_create_series(
        &mut self,
        tenant: &str,
        fingerprint: Fingerprint,
        labels: &LabelSet,
    ) -> Arc<Mutex<MemorySeries>> {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .series
            .entry(fingerprint)
            .or_insert_with(|| Arc::new(Mutex::new(MemorySeries::new(labels.clone()))))
            .clone()
    }

    /// Installs a series unconditionally, replacing any existing entry.
    ///
    /// Used by recovery when replaying checkpoint snapshots; a later
    /// duplicate for the same (tenant, fingerprint) wins.
    pub fn install_series(
        &mut self,
        tenant: &str,
        fingerprint: Fingerprint,
        labels: LabelSet,
        chunks: Vec<Chunk>,
    ) {
        let mut series = MemorySeries::new(labels);
        series.set_chunks(chunks);
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .series
            .insert(fingerprint, Arc::new(Mutex::new(series)));
    }

    /// Returns a stable snapshot of handles to every live series.
    ///
    /// The snapshot is consistent per series (handles stay valid even if
    /// the maps change afterwards) but not globally atomic.
    #[must_use]
    pub fn series_handles(&self) -> Vec<SeriesHandle> {
        let mut handles = Vec::with_capacity(self.num_series());
        for (tenant, state) in &self.tenants {
            for (fingerprint, series) in &state.series {
                handles.push(SeriesHandle {
                    tenant: tenant.clone(),
                    fingerprint: *fingerprint,
                    series: Arc::clone(series),
                });
            }
        }
        handles
    }

    /// Clones every series into a sorted, lock-free listing.
    ///
    /// Intended for tests and debugging; takes each per-series lock briefly.
    #[must_use]
    pub fn collect_all(&self) -> Vec<(TenantId, Fingerprint, MemorySeries)> {
        let mut all: Vec<_> = self
            .series_handles()
            .into_iter()
            .map(|h| (h.tenant, h.fingerprint, h.series.lock().clone()))
            .collect();
        all.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        all
    }
}

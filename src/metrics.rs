//! Run-wide counters and identity sets written by workers and read by the validator.
//!
//! `RunMetrics` keeps the totals as atomics so they can be observed cheaply while a
//! run is active, but every update also happens under the identity lock. A
//! `snapshot` taken under that lock therefore never sees a counter that disagrees
//! with the sets it was updated alongside.
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::{AcqRel, Acquire};

use parking_lot::Mutex;

use crate::item::WorkItem;

#[derive(Debug, Default)]
struct Identities {
    generated_labels: BTreeSet<String>,
    processed_labels: BTreeSet<String>,
    generated_serials: BTreeSet<u64>,
    processed_serials: BTreeSet<u64>,
    duplicated_serials: Vec<u64>,
}

/// Synchronized aggregator for everything the validator compares after a run.
#[derive(Debug, Default)]
pub struct RunMetrics {
    total_generated: AtomicU64,
    total_processed: AtomicU64,
    identities: Mutex<Identities>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by the queue while it still holds its own lock, so the push and its
    /// bookkeeping are observed together.
    pub(crate) fn record_generated(&self, item: &WorkItem) {
        let mut ids = self.identities.lock();
        ids.generated_labels.insert(item.label().to_owned());
        ids.generated_serials.insert(item.serial());
        self.total_generated.fetch_add(1, AcqRel);
    }

    pub(crate) fn record_processed(&self, item: &WorkItem) {
        let mut ids = self.identities.lock();
        ids.processed_labels.insert(item.label().to_owned());
        if !ids.processed_serials.insert(item.serial()) {
            ids.duplicated_serials.push(item.serial());
        }
        self.total_processed.fetch_add(1, AcqRel);
    }

    pub fn total_generated(&self) -> u64 {
        self.total_generated.load(Acquire)
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(Acquire)
    }

    /// Consistent copy of the counters and sets. Only meaningful once every worker has joined.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let ids = self.identities.lock();
        MetricsSnapshot {
            total_generated: self.total_generated.load(Acquire),
            total_processed: self.total_processed.load(Acquire),
            generated_labels: ids.generated_labels.clone(),
            processed_labels: ids.processed_labels.clone(),
            generated_serials: ids.generated_serials.clone(),
            processed_serials: ids.processed_serials.clone(),
            duplicated_serials: ids.duplicated_serials.clone(),
        }
    }
}

/// Frozen view of `RunMetrics`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_generated: u64,
    pub total_processed: u64,
    pub generated_labels: BTreeSet<String>,
    pub processed_labels: BTreeSet<String>,
    pub generated_serials: BTreeSet<u64>,
    pub processed_serials: BTreeSet<u64>,
    /// Serials that reached `record_processed` more than once, one entry per extra delivery.
    pub duplicated_serials: Vec<u64>,
}

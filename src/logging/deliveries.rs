//! Append-only logs of `bytemuck::Pod` delivery records.
//!
//! Each consumer owns a private `DeliveryLog` while the run is active, so logging a
//! delivery never contends with other workers. After join the logs are merged into
//! one log ordered by dequeue ordinal, which can be exported as raw bytes and read
//! back without any parsing step.
use std::collections::BTreeMap;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::{comms::shared::Dequeued, HarnessError};

/// One item handed to one consumer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct DeliveryRecord {
    pub serial: u64,
    pub ordinal: u64,
    pub producer_id: u32,
    pub sequence_index: u32,
    pub consumer_id: u32,
    _pad: u32,
}

unsafe impl Pod for DeliveryRecord {}
unsafe impl Zeroable for DeliveryRecord {}

impl DeliveryRecord {
    pub fn new(delivered: &Dequeued, consumer_id: u32) -> Self {
        Self {
            serial: delivered.item.serial(),
            ordinal: delivered.ordinal,
            producer_id: delivered.item.producer_id(),
            sequence_index: delivered.item.sequence_index(),
            consumer_id,
            _pad: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryLog {
    records: Vec<DeliveryRecord>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DeliveryRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DeliveryRecord] {
        &self.records
    }

    /// Merges per-consumer logs into one ordered by dequeue ordinal.
    pub fn merge<'a>(logs: impl IntoIterator<Item = &'a DeliveryLog>) -> Self {
        let mut records: Vec<DeliveryRecord> = logs
            .into_iter()
            .flat_map(|log| log.records.iter().copied())
            .collect();
        records.sort_unstable_by_key(|r| r.ordinal);
        Self { records }
    }

    /// Records whose dequeue position differs from their enqueue position.
    pub fn out_of_order(&self) -> impl Iterator<Item = &DeliveryRecord> {
        self.records.iter().filter(|r| r.serial != r.ordinal)
    }

    /// Number of deliveries per consumer id.
    pub fn per_consumer(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.records {
            *counts.entry(r.consumer_id).or_insert(0) += 1;
        }
        counts
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// Rebuilds a log from bytes produced by `as_bytes`. The input need not be aligned.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HarnessError> {
        if bytes.len() % size_of::<DeliveryRecord>() != 0 {
            return Err(HarnessError::MalformedTrace { len: bytes.len() });
        }
        Ok(Self {
            records: bytes
                .chunks_exact(size_of::<DeliveryRecord>())
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        })
    }
}

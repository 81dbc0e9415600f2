//! Work items and the label schemes used to name them.
use std::fmt::Display;

/// How a producer derives the human-readable label of an item.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelScheme {
    /// `"Image {producer * 100 + index}"`. Collides across producers once a
    /// producer emits 100 or more items.
    Legacy,
    /// `"Image {producer}-{index}"`, unique for any item count.
    #[default]
    Qualified,
}

impl LabelScheme {
    pub fn label(&self, producer_id: u32, sequence_index: u32) -> String {
        match self {
            LabelScheme::Legacy => {
                let id = u64::from(producer_id) * 100 + u64::from(sequence_index);
                format!("Image {id}")
            }
            LabelScheme::Qualified => format!("Image {producer_id}-{sequence_index}"),
        }
    }

    /// Largest per-producer item count for which labels stay unique across producers.
    pub fn unique_limit(&self) -> Option<u32> {
        match self {
            LabelScheme::Legacy => Some(100),
            LabelScheme::Qualified => None,
        }
    }
}

impl Display for LabelScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelScheme::Legacy => write!(f, "legacy (producer*100+index)"),
            LabelScheme::Qualified => write!(f, "qualified (producer-index)"),
        }
    }
}

/// An immutable unit of work handed from one producer to exactly one consumer.
///
/// `serial` is assigned by the queue at enqueue time and is unique within a run;
/// `label` is only as unique as the `LabelScheme` that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    serial: u64,
    producer_id: u32,
    sequence_index: u32,
    label: String,
}

impl WorkItem {
    /// Builds an item that has not been enqueued yet; the serial is stamped by `SharedQueue::enqueue`.
    pub fn new(producer_id: u32, sequence_index: u32, scheme: LabelScheme) -> Self {
        Self {
            serial: 0,
            producer_id,
            sequence_index,
            label: scheme.label(producer_id, sequence_index),
        }
    }

    pub(crate) fn stamp(&mut self, serial: u64) {
        self.serial = serial;
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn producer_id(&self) -> u32 {
        self.producer_id
    }

    pub fn sequence_index(&self) -> u32 {
        self.sequence_index
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

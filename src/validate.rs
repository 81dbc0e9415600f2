//! Post-run integrity checks.
//!
//! `validate` is a pure function over data captured after every worker has joined.
//! Counters and serials are the authoritative evidence; label-set equality is kept
//! as a diagnostic because labels may collide, and a collision is itself reported.
use std::fmt::Display;

use tracing::warn;

use crate::{
    comms::shared::QueueStats, logging::deliveries::DeliveryLog, metrics::MetricsSnapshot,
};

/// A single way in which a run failed to hand off items exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// `total_generated != total_processed`
    CountMismatch { generated: u64, processed: u64 },
    /// Serials generated but never processed
    LostItems { serials: Vec<u64> },
    /// Serials processed more than once
    DuplicateDelivery { serials: Vec<u64> },
    /// Serials processed that were never generated
    PhantomDelivery { serials: Vec<u64> },
    /// Distinct items shared labels, so label-set comparisons cannot be trusted
    LabelCollision { generated: u64, distinct_labels: usize },
    /// Generated and processed label sets differ
    LabelSetMismatch { missing: usize, unexpected: usize },
    /// Items still queued after every consumer terminated
    ResidualDepth { depth: usize },
    /// Watermark above the number of items ever pushed
    WatermarkExceedsGenerated { max_depth: usize, generated: u64 },
    /// Items left the queue in a different order than they entered it
    FifoViolation { count: usize },
    /// Delivery log length does not agree with the processed counter
    DeliveryLogMismatch { logged: usize, processed: u64 },
    /// Queue push/pop totals do not agree with the generated/processed counters
    QueueCounterMismatch {
        enqueued: u64,
        dequeued: u64,
        generated: u64,
        processed: u64,
    },
}

impl Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discrepancy::CountMismatch { generated, processed } => {
                write!(f, "generated {generated} items but processed {processed}")
            }
            Discrepancy::LostItems { serials } => {
                write!(f, "{} item(s) never processed", serials.len())
            }
            Discrepancy::DuplicateDelivery { serials } => {
                write!(f, "{} duplicate deliveries", serials.len())
            }
            Discrepancy::PhantomDelivery { serials } => {
                write!(f, "{} processed item(s) were never generated", serials.len())
            }
            Discrepancy::LabelCollision { generated, distinct_labels } => write!(
                f,
                "{generated} items generated but only {distinct_labels} distinct labels"
            ),
            Discrepancy::LabelSetMismatch { missing, unexpected } => write!(
                f,
                "label sets differ: {missing} missing, {unexpected} unexpected"
            ),
            Discrepancy::ResidualDepth { depth } => {
                write!(f, "{depth} item(s) left in the queue")
            }
            Discrepancy::WatermarkExceedsGenerated { max_depth, generated } => write!(
                f,
                "max depth {max_depth} exceeds {generated} generated items"
            ),
            Discrepancy::FifoViolation { count } => {
                write!(f, "{count} item(s) dequeued out of order")
            }
            Discrepancy::DeliveryLogMismatch { logged, processed } => write!(
                f,
                "delivery log holds {logged} records for {processed} processed items"
            ),
            Discrepancy::QueueCounterMismatch {
                enqueued,
                dequeued,
                generated,
                processed,
            } => write!(
                f,
                "queue saw {enqueued} pushes and {dequeued} pops \
                 for {generated} generated and {processed} processed items"
            ),
        }
    }
}

/// Outcome of validating one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Generated and processed label sets are equal.
    pub all_processed: bool,
    /// Distinct generated labels.
    pub generated_count: usize,
    /// Distinct processed labels.
    pub processed_count: usize,
    pub max_depth: usize,
    pub final_depth: usize,
    pub total_generated: u64,
    pub total_processed: u64,
    pub lost: Vec<u64>,
    pub duplicated: Vec<u64>,
    pub discrepancies: Vec<Discrepancy>,
}

impl IntegrityReport {
    pub fn is_success(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn has_label_collision(&self) -> bool {
        self.discrepancies
            .iter()
            .any(|d| matches!(d, Discrepancy::LabelCollision { .. }))
    }

    /// One line, `; `-separated list of discrepancies, or `"ok"`.
    pub fn summary(&self) -> String {
        if self.is_success() {
            return "ok".to_owned();
        }
        self.discrepancies
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Compares what was generated with what was delivered.
pub fn validate(
    metrics: &MetricsSnapshot,
    queue: &QueueStats,
    deliveries: &DeliveryLog,
) -> IntegrityReport {
    let mut discrepancies = Vec::new();

    if metrics.total_generated != metrics.total_processed {
        discrepancies.push(Discrepancy::CountMismatch {
            generated: metrics.total_generated,
            processed: metrics.total_processed,
        });
    }

    let lost: Vec<u64> = metrics
        .generated_serials
        .difference(&metrics.processed_serials)
        .copied()
        .collect();
    if !lost.is_empty() {
        discrepancies.push(Discrepancy::LostItems { serials: lost.clone() });
    }

    let duplicated = metrics.duplicated_serials.clone();
    if !duplicated.is_empty() {
        discrepancies.push(Discrepancy::DuplicateDelivery {
            serials: duplicated.clone(),
        });
    }

    let phantom: Vec<u64> = metrics
        .processed_serials
        .difference(&metrics.generated_serials)
        .copied()
        .collect();
    if !phantom.is_empty() {
        discrepancies.push(Discrepancy::PhantomDelivery { serials: phantom });
    }

    let distinct_labels = metrics.generated_labels.len();
    if metrics.total_generated != distinct_labels as u64 {
        discrepancies.push(Discrepancy::LabelCollision {
            generated: metrics.total_generated,
            distinct_labels,
        });
    }

    let all_processed = metrics.generated_labels == metrics.processed_labels;
    if !all_processed {
        discrepancies.push(Discrepancy::LabelSetMismatch {
            missing: metrics.generated_labels.difference(&metrics.processed_labels).count(),
            unexpected: metrics.processed_labels.difference(&metrics.generated_labels).count(),
        });
    }

    if queue.depth != 0 {
        discrepancies.push(Discrepancy::ResidualDepth { depth: queue.depth });
    }
    if queue.max_depth as u64 > metrics.total_generated {
        discrepancies.push(Discrepancy::WatermarkExceedsGenerated {
            max_depth: queue.max_depth,
            generated: metrics.total_generated,
        });
    }

    if queue.enqueued != metrics.total_generated || queue.dequeued != metrics.total_processed {
        discrepancies.push(Discrepancy::QueueCounterMismatch {
            enqueued: queue.enqueued,
            dequeued: queue.dequeued,
            generated: metrics.total_generated,
            processed: metrics.total_processed,
        });
    }

    let out_of_order = deliveries.out_of_order().count();
    if out_of_order > 0 {
        discrepancies.push(Discrepancy::FifoViolation { count: out_of_order });
    }
    if deliveries.len() as u64 != metrics.total_processed {
        discrepancies.push(Discrepancy::DeliveryLogMismatch {
            logged: deliveries.len(),
            processed: metrics.total_processed,
        });
    }

    for d in &discrepancies {
        warn!(discrepancy = %d, "integrity check failed");
    }

    IntegrityReport {
        all_processed,
        generated_count: distinct_labels,
        processed_count: metrics.processed_labels.len(),
        max_depth: queue.max_depth,
        final_depth: queue.depth,
        total_generated: metrics.total_generated,
        total_processed: metrics.total_processed,
        lost,
        duplicated,
        discrepancies,
    }
}

//! Simulated generation and processing latency.
//!
//! Workers call their `Workload` outside every lock, so a latency model only changes
//! interleavings and never takes part in synchronization.
use std::ops::Range;
use std::thread;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::item::WorkItem;

/// Simulated cost of generating and processing an item.
///
/// Hooks run outside every lock; they add latency only and are never a
/// synchronization point.
pub trait Workload: Send + Sync {
    fn generate(&self, _producer_id: u32, _sequence_index: u32) {}
    fn process(&self, _item: &WorkItem, _consumer_id: u32) {}
}

/// No simulated latency at all.
#[derive(Debug, Copy, Clone, Default)]
pub struct Immediate;

impl Workload for Immediate {}

/// Constant latency per generated and per processed item.
#[derive(Debug, Copy, Clone, Default)]
pub struct FixedDelay {
    pub generate: Duration,
    pub process: Duration,
}

impl FixedDelay {
    pub fn new(generate: Duration, process: Duration) -> Self {
        Self { generate, process }
    }

    /// Fast producers, slow consumers.
    pub fn slow_consumer(process: Duration) -> Self {
        Self::new(Duration::ZERO, process)
    }
}

impl Workload for FixedDelay {
    fn generate(&self, _producer_id: u32, _sequence_index: u32) {
        pause(self.generate);
    }

    fn process(&self, _item: &WorkItem, _consumer_id: u32) {
        pause(self.process);
    }
}

/// Uniformly random latency in milliseconds, reproducible for a given seed.
///
/// Every draw seeds its own generator from the seed and the worker/item ids, so
/// workers never share a generator and the same run always sleeps the same amounts.
#[derive(Debug, Clone)]
pub struct RandomDelay {
    generate_ms: Range<u64>,
    process_ms: Range<u64>,
    seed: u64,
}

impl Default for RandomDelay {
    fn default() -> Self {
        Self::new(100..300, 300..600, 0x5eed)
    }
}

impl RandomDelay {
    pub fn new(generate_ms: Range<u64>, process_ms: Range<u64>, seed: u64) -> Self {
        Self {
            generate_ms,
            process_ms,
            seed,
        }
    }

    fn draw(&self, range: &Range<u64>, a: u64, b: u64) -> Duration {
        if range.is_empty() {
            return Duration::ZERO;
        }
        let mut rng = SmallRng::seed_from_u64(self.seed ^ a.rotate_left(32) ^ b);
        Duration::from_millis(rng.random_range(range.clone()))
    }

    pub fn generate_delay(&self, producer_id: u32, sequence_index: u32) -> Duration {
        self.draw(
            &self.generate_ms,
            u64::from(producer_id),
            u64::from(sequence_index),
        )
    }

    pub fn process_delay(&self, item: &WorkItem, consumer_id: u32) -> Duration {
        // high bit keeps process draws apart from generate draws of the same ids
        self.draw(
            &self.process_ms,
            u64::from(consumer_id) | 1 << 31,
            item.serial(),
        )
    }
}

impl Workload for RandomDelay {
    fn generate(&self, producer_id: u32, sequence_index: u32) {
        pause(self.generate_delay(producer_id, sequence_index));
    }

    fn process(&self, item: &WorkItem, consumer_id: u32) {
        pause(self.process_delay(item, consumer_id));
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

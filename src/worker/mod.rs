//! Producer and consumer loops plus the pluggable latency model they run.
//!
//! Workers never touch shared state except through the `RunContext` they are given.
use std::fmt::Display;

pub mod consumer;
pub mod producer;
pub mod workload;

pub use consumer::{ConsumerState, ConsumerSummary, ConsumerWorker};
pub use producer::{ProducerSummary, ProducerWorker};
pub use workload::{FixedDelay, Immediate, RandomDelay, Workload};

/// Which side of the queue a worker sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkerRole {
    Producer,
    Consumer,
}

impl Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerRole::Producer => write!(f, "producer"),
            WorkerRole::Consumer => write!(f, "consumer"),
        }
    }
}

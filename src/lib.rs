use std::fmt::Display;

use thiserror::Error;

use crate::worker::WorkerRole;

pub mod comms;
pub mod context;
pub mod item;
pub mod logging;
pub mod metrics;
pub mod scenario;
pub mod sync;
pub mod validate;
pub mod worker;

pub use context::RunContext;
pub use item::{LabelScheme, WorkItem};
pub use scenario::{run_scenario, Scenario, ScenarioOutcome, ScenarioRunner};
pub use validate::{validate, Discrepancy, IntegrityReport};

/// Wrapper type for `std::io::Error`
#[derive(Debug, Error)]
pub struct IoError(std::io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl Eq for IoError {}
impl Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Io { err: IoError(err) }
    }
}

/// Error type for the harness
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("Invalid scenario parameters: {reason}")]
    InvalidScenario { reason: String },
    #[error("Shutdown signaled while {0} producer(s) were still running")]
    ProducersStillActive(usize),
    #[error("Shutdown was already signaled for this run")]
    ShutdownAlreadySignaled,
    #[error("{role} {id} panicked before finishing")]
    WorkerPanicked { role: WorkerRole, id: u32 },
    #[error("Integrity validation failed for '{scenario}': {summary}")]
    IntegrityViolation { scenario: String, summary: String },
    #[error("Delivery trace of {len} bytes is not a whole number of records")]
    MalformedTrace { len: usize },
    #[error("I/O error while managing worker threads {:?}", err)]
    Io {
        #[from]
        err: IoError,
    },
}

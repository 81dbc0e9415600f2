//! Run termination primitives.
//!
//! Currently this holds the `shutdown` coordinator, the one-way "no more items"
//! signal that lets idle consumers leave the queue's wait.
use std::fmt::Display;

pub mod shutdown;

/// Lifecycle of a run's shutdown flag. Moves from `Active` to `Finished` exactly once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShutdownState {
    /// Producers may still enqueue.
    Active,
    /// Every producer has terminated; consumers drain and exit.
    Finished,
}

impl Display for ShutdownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownState::Active => write!(f, "Active"),
            ShutdownState::Finished => write!(f, "Finished"),
        }
    }
}

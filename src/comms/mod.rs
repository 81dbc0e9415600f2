//! Work distribution channels shared between producers and consumers.
//!
//! The `shared` submodule contains the lock-and-condition monitor queue that every
//! worker of a run pushes into or pops from.
pub mod shared;

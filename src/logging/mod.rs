//! Structured, allocation-light records of what happened during a run.
//!
//! `deliveries` keeps one plain-old-data record per processed item, which the
//! validator uses to check FIFO handoff and per-consumer distribution.

pub mod deliveries;

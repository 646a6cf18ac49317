//! Scan orchestration for LawWatch.
//!
//! This crate ties together the feed tracker, stage resolver, attachment
//! extraction and notification into one cycle ([`run_cycle`]) and a periodic
//! loop ([`watch`]).

pub mod attachment;
pub mod pipeline;
pub mod pool;
pub mod recorder;
pub mod schedule;

#[cfg(test)]
mod testing;

pub use pipeline::{CycleReport, ProgressReporter, ScanContext, SilentProgress, run_cycle};
pub use schedule::{Schedule, watch};

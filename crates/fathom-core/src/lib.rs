//! Core types for the fathom scan engine.
//!
//! This crate provides the fundamental data structures shared across the
//! fathom ecosystem: directory entries and per-path scan results, the scan
//! lifecycle state machine and progress counters, the error taxonomy, and
//! engine configuration.

mod config;
mod entry;
mod error;
mod progress;

pub use config::{BackendChoice, BackendKind, EngineConfig, EngineConfigBuilder};
pub use entry::{ScanEntry, ScanResult, sort_for_display};
pub use error::ScanError;
pub use progress::{ScanProgress, ScanState};

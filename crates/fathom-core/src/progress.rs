//! Scan lifecycle state and progress counters.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of one scan.
///
/// A scan moves `Idle -> Scanning -> {Done, Cancelled, Failed}` and
/// never leaves a terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ScanState {
    /// Created but not yet started.
    Idle,
    /// A worker is enumerating entries.
    Scanning,
    /// Finished; results are available.
    Done,
    /// Cancelled before completion; partial entries are discarded.
    Cancelled,
    /// Failed; the error is recorded on the handle.
    Failed,
}

impl ScanState {
    /// Whether the scan has reached a final state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// Progress counters for one scan.
///
/// Both counters are zero before the scan starts. `total` is fixed once
/// enumeration establishes it; `current` only ever grows and freezes at
/// its last value in terminal states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Entries processed so far.
    pub current: u64,

    /// Entries expected in total (0 until known).
    pub total: u64,
}

impl ScanProgress {
    /// Completion ratio in `[0.0, 1.0]`; 0.0 while the total is unknown.
    pub fn fraction(self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64 / self.total as f64).min(1.0)
        }
    }
}

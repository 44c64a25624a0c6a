//! Async adapter over scan handles.

use std::path::PathBuf;

use fathom_core::{ScanEntry, ScanError, ScanProgress, ScanState};

use crate::engine::ScanEngine;
use crate::handle::{POLL_INTERVAL, ScanHandle};

/// A scan awaited from async code.
///
/// The scan itself still runs on its worker thread; the task polls it
/// with async sleeps, so awaiting never parks a runtime thread. Callers
/// bring their own runtime; only the `time` feature is needed.
pub struct ScanTask {
    handle: ScanHandle,
}

impl ScanTask {
    /// Begin a scan through `engine` and wrap it as a task.
    pub fn spawn(engine: &ScanEngine, path: impl Into<PathBuf>) -> Result<Self, ScanError> {
        Ok(Self {
            handle: engine.begin(path)?,
        })
    }

    /// Begin a capped scan. A cap of 0 uses the engine's default.
    pub fn spawn_fast(
        engine: &ScanEngine,
        path: impl Into<PathBuf>,
        cap: usize,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            handle: engine.begin_fast(path, cap)?,
        })
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> ScanState {
        self.handle.state()
    }

    /// Current progress counters. Never blocks.
    pub fn progress(&self) -> ScanProgress {
        self.handle.progress()
    }

    /// Request cancellation of the underlying scan.
    pub fn cancel(&self) {
        self.handle.cancel()
    }

    /// Await the terminal state and return the entries.
    ///
    /// Cancellation surfaces as `Err(Interrupted)` here: a consumed
    /// task has no state left to report it through.
    pub async fn join(self) -> Result<Vec<ScanEntry>, ScanError> {
        self.join_with_progress(|_| {}).await
    }

    /// Await completion, observing progress on every poll tick.
    pub async fn join_with_progress(
        self,
        mut on_progress: impl FnMut(ScanProgress),
    ) -> Result<Vec<ScanEntry>, ScanError> {
        loop {
            let state = self.handle.state();
            on_progress(self.handle.progress());
            match state {
                ScanState::Done => return self.handle.results(),
                ScanState::Cancelled => return Err(ScanError::Interrupted),
                ScanState::Failed => {
                    return Err(self
                        .handle
                        .take_failure()
                        .unwrap_or_else(|| ScanError::other("scan failed")));
                }
                ScanState::Idle | ScanState::Scanning => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
    }
}

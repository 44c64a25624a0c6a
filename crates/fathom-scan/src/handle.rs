//! Handles for individual asynchronous scans.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use fathom_core::{ScanEntry, ScanError, ScanProgress, ScanResult, ScanState};

use crate::backend::{ScanBackend, ScanContext};

/// Cadence of every sleep-poll loop in the engine.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(10);

struct HandleState {
    state: ScanState,
    path: Option<PathBuf>,
    entries: Vec<ScanEntry>,
    error: Option<Arc<ScanError>>,
}

/// One asynchronous directory scan.
///
/// The state machine is `Idle -> Scanning -> {Done, Cancelled, Failed}`
/// and never leaves a terminal state. `state`, `progress` and `cancel`
/// never block on scan completion; `wait` is the only suspending call.
/// Dropping a live handle cancels the scan and joins its worker.
pub struct ScanHandle {
    backend: Arc<dyn ScanBackend>,
    ctx: ScanContext,
    shared: Arc<Mutex<HandleState>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ScanHandle {
    /// Create an idle handle against a backend.
    pub fn new(backend: Arc<dyn ScanBackend>) -> Self {
        Self {
            backend,
            ctx: ScanContext::new(),
            shared: Arc::new(Mutex::new(HandleState {
                state: ScanState::Idle,
                path: None,
                entries: Vec::new(),
                error: None,
            })),
            worker: Mutex::new(None),
        }
    }

    /// Begin scanning `path` on a worker thread.
    ///
    /// Only handle misuse fails here: a handle scans once, so a second
    /// `start` returns `AlreadyStarted`. Problems with the path itself
    /// surface later as the `Failed` state.
    pub fn start(&self, path: impl Into<PathBuf>) -> Result<(), ScanError> {
        self.start_inner(path.into(), 0)
    }

    /// Begin a capped scan. A cap of 0 means unlimited.
    pub fn start_fast(&self, path: impl Into<PathBuf>, cap: usize) -> Result<(), ScanError> {
        self.start_inner(path.into(), cap)
    }

    fn start_inner(&self, path: PathBuf, cap: usize) -> Result<(), ScanError> {
        {
            let mut shared = self.shared.lock();
            if shared.state != ScanState::Idle {
                return Err(ScanError::AlreadyStarted);
            }
            shared.state = ScanState::Scanning;
            shared.path = Some(path.clone());
        }

        let backend = Arc::clone(&self.backend);
        let ctx = self.ctx.clone();
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("fathom-scan".into())
            .spawn(move || {
                let outcome = if cap == 0 {
                    backend.scan(&path, &ctx)
                } else {
                    backend.scan_fast(&path, cap, &ctx)
                };

                let mut shared = shared.lock();
                // Only Scanning commits: a cancel that raced us already
                // moved the state, and its decision stands.
                if shared.state != ScanState::Scanning {
                    return;
                }
                match outcome {
                    Ok(entries) => {
                        shared.entries = entries;
                        shared.state = ScanState::Done;
                    }
                    Err(ScanError::Interrupted) => shared.state = ScanState::Cancelled,
                    Err(err) => {
                        shared.error = Some(Arc::new(err));
                        shared.state = ScanState::Failed;
                    }
                }
            });

        match spawned {
            Ok(worker) => {
                *self.worker.lock() = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.shared.lock().state = ScanState::Failed;
                Err(ScanError::other(format!(
                    "failed to spawn scan worker: {err}"
                )))
            }
        }
    }

    /// Current state. Never blocks on the scan.
    pub fn state(&self) -> ScanState {
        self.shared.lock().state
    }

    /// Current progress counters; `{0, 0}` before the scan starts.
    pub fn progress(&self) -> ScanProgress {
        self.ctx.progress()
    }

    /// Request cancellation.
    ///
    /// Idempotent and a no-op once the scan is terminal (or was never
    /// started). Entries gathered before the cancel are discarded.
    pub fn cancel(&self) {
        let mut shared = self.shared.lock();
        if shared.state == ScanState::Scanning {
            self.ctx.cancel();
            shared.state = ScanState::Cancelled;
        }
    }

    /// Sleep-poll until the scan is terminal, returning the state it
    /// landed in. Cancellation is an outcome here, not an error.
    ///
    /// With a timeout the wait gives up after that long with
    /// `Err(Timeout)`; the scan itself keeps running and may still be
    /// cancelled or waited on again. Waiting on a never-started handle
    /// returns `NotReady` instead of spinning forever.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<ScanState, ScanError> {
        self.wait_with_progress(timeout, |_| {})
    }

    /// Like [`wait`](Self::wait), invoking `on_progress` on every poll
    /// tick, including the terminal one.
    pub fn wait_with_progress(
        &self,
        timeout: Option<Duration>,
        mut on_progress: impl FnMut(ScanProgress),
    ) -> Result<ScanState, ScanError> {
        let started = Instant::now();
        loop {
            let state = self.state();
            on_progress(self.progress());
            if state.is_terminal() {
                return Ok(state);
            }
            if state == ScanState::Idle {
                return Err(ScanError::NotReady { state });
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(ScanError::Timeout {
                        elapsed: started.elapsed(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Clone out the entries of a `Done` scan; `NotReady` otherwise.
    pub fn results(&self) -> Result<Vec<ScanEntry>, ScanError> {
        let shared = self.shared.lock();
        if shared.state != ScanState::Done {
            return Err(ScanError::NotReady {
                state: shared.state,
            });
        }
        Ok(shared.entries.clone())
    }

    /// The error behind a `Failed` scan, if any.
    pub fn failure(&self) -> Option<Arc<ScanError>> {
        self.shared.lock().error.clone()
    }

    /// Remove and return the failure, restoring unique ownership. A
    /// clone handed out through [`failure`](Self::failure) degrades
    /// this to a message-only copy.
    pub(crate) fn take_failure(&self) -> Option<ScanError> {
        let arc = self.shared.lock().error.take()?;
        Some(match Arc::try_unwrap(arc) {
            Ok(err) => err,
            Err(arc) => ScanError::other(arc.to_string()),
        })
    }

    /// Consume the handle and package its outcome as a [`ScanResult`].
    ///
    /// A still-running scan is cancelled and joined first, so the
    /// result reflects a terminal state.
    pub fn into_result(self) -> ScanResult {
        self.cancel();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }

        let mut shared = self.shared.lock();
        let path = shared.path.take().unwrap_or_default();
        match shared.state {
            ScanState::Done => {
                let entries = std::mem::take(&mut shared.entries);
                drop(shared);
                ScanResult::ok(path, entries)
            }
            ScanState::Failed => {
                let message = shared
                    .error
                    .take()
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "scan failed".to_string());
                drop(shared);
                ScanResult::failed(path, message)
            }
            ScanState::Cancelled => {
                drop(shared);
                ScanResult::failed(path, "cancelled")
            }
            ScanState::Idle | ScanState::Scanning => {
                drop(shared);
                ScanResult::failed(path, "scan never started")
            }
        }
    }

    /// Cancel any in-flight work and release the worker.
    ///
    /// Equivalent to dropping the handle, spelled out for call sites
    /// that want the teardown visible.
    pub fn close(self) {}
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    use crate::readdir::ReadDirBackend;

    fn handle() -> ScanHandle {
        ScanHandle::new(Arc::new(ReadDirBackend::new()))
    }

    fn populated_dir(files: usize) -> TempDir {
        let temp = TempDir::new().unwrap();
        for i in 0..files {
            fs::write(temp.path().join(format!("f{i:03}.txt")), "data").unwrap();
        }
        temp
    }

    /// Backend that blocks until its context is cancelled, for
    /// deterministic cancellation tests.
    struct StallingBackend;

    impl ScanBackend for StallingBackend {
        fn kind(&self) -> fathom_core::BackendKind {
            fathom_core::BackendKind::InProcess
        }

        fn version(&self) -> String {
            "stalling".to_string()
        }

        fn scan(&self, _path: &Path, ctx: &ScanContext) -> Result<Vec<ScanEntry>, ScanError> {
            ctx.set_total(100);
            loop {
                if ctx.is_cancelled() {
                    return Err(ScanError::Interrupted);
                }
                ctx.advance();
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn scan_fast(
            &self,
            path: &Path,
            _cap: usize,
            ctx: &ScanContext,
        ) -> Result<Vec<ScanEntry>, ScanError> {
            self.scan(path, ctx)
        }
    }

    #[test]
    fn test_idle_handle_shape() {
        let handle = handle();
        assert_eq!(handle.state(), ScanState::Idle);
        let progress = handle.progress();
        assert_eq!((progress.current, progress.total), (0, 0));
        assert!(matches!(
            handle.results(),
            Err(ScanError::NotReady { .. })
        ));
    }

    #[test]
    fn test_scan_reaches_done_with_results() {
        let temp = populated_dir(3);
        let handle = handle();

        handle.start(temp.path()).unwrap();
        let state = handle.wait(Some(Duration::from_secs(5))).unwrap();

        assert_eq!(state, ScanState::Done);
        assert_eq!(handle.results().unwrap().len(), 3);

        let progress = handle.progress();
        assert_eq!(progress.current, progress.total);
        assert_eq!(progress.total, 3);
    }

    #[test]
    fn test_start_twice_fails() {
        let temp = populated_dir(1);
        let handle = handle();

        handle.start(temp.path()).unwrap();
        assert!(matches!(
            handle.start(temp.path()),
            Err(ScanError::AlreadyStarted)
        ));

        handle.wait(Some(Duration::from_secs(5))).unwrap();
        // Terminal handles reject restarts too.
        assert!(matches!(
            handle.start(temp.path()),
            Err(ScanError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_missing_path_fails_asynchronously() {
        let handle = handle();
        // start itself accepts the bad path...
        handle.start("/does/not/exist").unwrap();
        // ...and the failure surfaces through the state machine.
        let state = handle.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(state, ScanState::Failed);

        let failure = handle.failure().unwrap();
        assert!(matches!(*failure, ScanError::NotFound { .. }));
        assert!(matches!(
            handle.results(),
            Err(ScanError::NotReady { .. })
        ));
    }

    #[test]
    fn test_cancel_is_idempotent_and_discards_entries() {
        let handle = ScanHandle::new(Arc::new(StallingBackend));
        handle.start("/anywhere").unwrap();

        handle.cancel();
        handle.cancel();

        let state = handle.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(state, ScanState::Cancelled);
        assert!(matches!(
            handle.results(),
            Err(ScanError::NotReady { .. })
        ));
        assert!(handle.failure().is_none());
    }

    #[test]
    fn test_cancel_after_done_is_a_no_op() {
        let temp = populated_dir(2);
        let handle = handle();

        handle.start(temp.path()).unwrap();
        handle.wait(Some(Duration::from_secs(5))).unwrap();

        handle.cancel();
        assert_eq!(handle.state(), ScanState::Done);
        assert_eq!(handle.results().unwrap().len(), 2);
    }

    #[test]
    fn test_progress_stays_readable_after_cancel() {
        let handle = ScanHandle::new(Arc::new(StallingBackend));
        handle.start("/anywhere").unwrap();

        // Let the stalling worker tick a few times.
        thread::sleep(Duration::from_millis(30));
        handle.cancel();
        handle.wait(Some(Duration::from_secs(5))).unwrap();

        let progress = handle.progress();
        assert!(progress.current > 0);
        assert_eq!(progress.total, 100);
    }

    #[test]
    fn test_wait_timeout_does_not_cancel() {
        let handle = ScanHandle::new(Arc::new(StallingBackend));
        handle.start("/anywhere").unwrap();

        let err = handle.wait(Some(Duration::from_millis(30))).unwrap_err();
        assert!(matches!(err, ScanError::Timeout { .. }));
        // The scan is still live after the wait gave up.
        assert_eq!(handle.state(), ScanState::Scanning);

        handle.cancel();
        let state = handle.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(state, ScanState::Cancelled);
    }

    #[test]
    fn test_wait_on_idle_handle_errors() {
        let handle = handle();
        assert!(matches!(
            handle.wait(Some(Duration::from_millis(50))),
            Err(ScanError::NotReady { .. })
        ));
    }

    #[test]
    fn test_wait_with_progress_observes_ticks() {
        let temp = populated_dir(5);
        let handle = handle();
        handle.start(temp.path()).unwrap();

        let mut snapshots = Vec::new();
        let state = handle
            .wait_with_progress(Some(Duration::from_secs(5)), |p| snapshots.push(p))
            .unwrap();

        assert_eq!(state, ScanState::Done);
        assert!(!snapshots.is_empty());
        // Monotone current across observations.
        for pair in snapshots.windows(2) {
            assert!(pair[0].current <= pair[1].current);
        }
    }

    #[test]
    fn test_into_result_packages_done() {
        let temp = populated_dir(2);
        let handle = handle();
        handle.start(temp.path()).unwrap();
        handle.wait(Some(Duration::from_secs(5))).unwrap();

        let result = handle.into_result();
        assert!(result.success);
        assert_eq!(result.path, temp.path());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_into_result_packages_failure_text() {
        let handle = handle();
        handle.start("/does/not/exist").unwrap();
        handle.wait(Some(Duration::from_secs(5))).unwrap();

        let result = handle.into_result();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_into_result_cancels_live_scans() {
        let handle = ScanHandle::new(Arc::new(StallingBackend));
        handle.start("/anywhere").unwrap();

        let result = handle.into_result();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_drop_joins_live_worker() {
        let handle = ScanHandle::new(Arc::new(StallingBackend));
        handle.start("/anywhere").unwrap();
        // Dropping must cancel and join rather than leak the worker.
        drop(handle);
    }
}

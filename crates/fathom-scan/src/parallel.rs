//! Parallel scan orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use tracing::debug;

use fathom_core::{EngineConfig, ScanEntry, ScanError, ScanResult};

use crate::backend::ScanBackend;
use crate::handle::ScanHandle;

/// Fans a batch of paths out over a bounded worker pool.
///
/// Each worker owns at most one handle at a time and destroys it before
/// taking the next path, so resource usage is bounded by the pool size
/// no matter how many paths are requested, and one path's failure never
/// affects another's result.
pub struct ParallelScanner {
    backend: Arc<dyn ScanBackend>,
    config: EngineConfig,
}

impl ParallelScanner {
    pub(crate) fn new(backend: Arc<dyn ScanBackend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// Scan every path, returning one result per path in completion
    /// order. Callers that need input order re-sort by `path`.
    pub fn scan_all(&self, paths: &[PathBuf]) -> Vec<ScanResult> {
        self.run(paths, |_, _| {})
    }

    /// Scan every path, invoking `on_progress(completed, total)` once
    /// per finished path. The callback runs under the results lock, so
    /// the pairs it sees are exact and in order; keep it cheap.
    pub fn scan_all_with_progress(
        &self,
        paths: &[PathBuf],
        on_progress: impl Fn(usize, usize) + Send + Sync,
    ) -> Vec<ScanResult> {
        self.run(paths, on_progress)
    }

    /// Scan every path and flatten the successful results, tagging each
    /// entry with the path it came from. The filter, when present,
    /// keeps only matching entries.
    pub fn scan_all_merged(
        &self,
        paths: &[PathBuf],
        filter: Option<&(dyn Fn(&ScanEntry) -> bool + Send + Sync)>,
    ) -> Vec<(PathBuf, ScanEntry)> {
        let mut merged = Vec::new();
        for result in self.scan_all(paths) {
            if !result.success {
                debug!(path = %result.path.display(), "dropping failed path from merge");
                continue;
            }
            for entry in result.entries {
                if filter.is_none_or(|keep| keep(&entry)) {
                    merged.push((result.path.clone(), entry));
                }
            }
        }
        merged
    }

    fn run(
        &self,
        paths: &[PathBuf],
        on_progress: impl Fn(usize, usize) + Send + Sync,
    ) -> Vec<ScanResult> {
        if paths.is_empty() {
            return Vec::new();
        }

        let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
        for path in paths {
            let _ = tx.send(path.clone());
        }
        drop(tx);

        let total = paths.len();
        let workers = self.config.pool_size.min(total);
        let results = Mutex::new(Vec::with_capacity(total));

        thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let results = &results;
                let on_progress = &on_progress;
                scope.spawn(move || loop {
                    // Non-blocking pop: an empty queue means this
                    // worker is finished.
                    let path = match rx.try_recv() {
                        Ok(path) => path,
                        Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                    };
                    let result = self.scan_one(path);
                    let mut results = results.lock();
                    results.push(result);
                    on_progress(results.len(), total);
                });
            }
        });

        results.into_inner()
    }

    /// Drive one path through a fresh handle: start, bounded wait,
    /// package, destroy.
    fn scan_one(&self, path: PathBuf) -> ScanResult {
        let handle = ScanHandle::new(Arc::clone(&self.backend));
        if let Err(err) = handle.start(path.clone()) {
            return ScanResult::failed(path, err.to_string());
        }
        match handle.wait(Some(self.config.scan_timeout)) {
            Ok(_) => handle.into_result(),
            Err(ScanError::Timeout { .. }) => {
                handle.cancel();
                ScanResult::failed(path, "timeout")
            }
            Err(err) => ScanResult::failed(path, err.to_string()),
        }
    }
}

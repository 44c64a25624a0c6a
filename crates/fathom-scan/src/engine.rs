//! Engine facade tying backend selection, handles, and the
//! orchestrator together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use fathom_core::{BackendKind, EngineConfig, ScanEntry, ScanError, ScanState};

use crate::backend::ScanBackend;
use crate::handle::ScanHandle;
use crate::parallel::ParallelScanner;
use crate::selector::BackendRegistry;

/// Scan engine: selects a backend once and mints handles against it.
///
/// The selection happens at construction and every handle this engine
/// creates shares the same backend instance.
pub struct ScanEngine {
    backend: Arc<dyn ScanBackend>,
    config: EngineConfig,
}

impl ScanEngine {
    /// Build an engine, selecting the backend per `config`.
    pub fn new(config: EngineConfig) -> Result<Self, ScanError> {
        let backend = BackendRegistry::new().select(config.backend)?;
        info!(backend = %backend.kind(), version = %backend.version(), "scan engine ready");
        Ok(Self { backend, config })
    }

    /// Engine with default configuration.
    pub fn with_defaults() -> Result<Self, ScanError> {
        Self::new(EngineConfig::default())
    }

    /// Engine over an explicit backend, bypassing selection. Used by
    /// embedders that bring their own implementation.
    pub fn with_backend(backend: Arc<dyn ScanBackend>, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// The kind of backend this engine scans with.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// The backend's version string.
    pub fn backend_version(&self) -> String {
        self.backend.version()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Begin an asynchronous scan of `path`.
    pub fn begin(&self, path: impl Into<PathBuf>) -> Result<ScanHandle, ScanError> {
        let handle = ScanHandle::new(Arc::clone(&self.backend));
        handle.start(path)?;
        Ok(handle)
    }

    /// Begin a capped asynchronous scan. A cap of 0 uses the configured
    /// default.
    pub fn begin_fast(&self, path: impl Into<PathBuf>, cap: usize) -> Result<ScanHandle, ScanError> {
        let cap = if cap == 0 {
            self.config.fast_scan_cap
        } else {
            cap
        };
        let handle = ScanHandle::new(Arc::clone(&self.backend));
        handle.start_fast(path, cap)?;
        Ok(handle)
    }

    /// Scan synchronously, bounded by the configured timeout.
    pub fn scan_directory(&self, path: impl AsRef<Path>) -> Result<Vec<ScanEntry>, ScanError> {
        let handle = self.begin(path.as_ref())?;
        self.finish(handle)
    }

    /// Synchronous capped scan. A cap of 0 uses the configured default.
    pub fn scan_directory_fast(
        &self,
        path: impl AsRef<Path>,
        cap: usize,
    ) -> Result<Vec<ScanEntry>, ScanError> {
        let handle = self.begin_fast(path.as_ref(), cap)?;
        self.finish(handle)
    }

    /// Parallel orchestrator sharing this engine's backend and config.
    pub fn parallel(&self) -> ParallelScanner {
        ParallelScanner::new(Arc::clone(&self.backend), self.config.clone())
    }

    fn finish(&self, handle: ScanHandle) -> Result<Vec<ScanEntry>, ScanError> {
        match handle.wait(Some(self.config.scan_timeout))? {
            ScanState::Done => handle.results(),
            ScanState::Failed => Err(handle
                .take_failure()
                .unwrap_or_else(|| ScanError::other("scan failed"))),
            // Nothing cancels the private handle of a synchronous scan;
            // treat it like an interruption if it happens anyway.
            _ => Err(ScanError::Interrupted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::readdir::ReadDirBackend;

    fn in_process_engine() -> ScanEngine {
        ScanEngine::with_backend(Arc::new(ReadDirBackend::new()), EngineConfig::default())
    }

    #[test]
    fn test_scan_directory_returns_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "abc").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();

        let engine = in_process_engine();
        let entries = engine.scan_directory(temp.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_scan_directory_propagates_not_found() {
        let engine = in_process_engine();
        let err = engine.scan_directory("/does/not/exist").unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_fast_scan_cap_zero_uses_config_default() {
        let temp = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(temp.path().join(format!("f{i}")), "x").unwrap();
        }

        let config = EngineConfig::builder()
            .fast_scan_cap(4usize)
            .build()
            .unwrap();
        let engine = ScanEngine::with_backend(Arc::new(ReadDirBackend::new()), config);

        let entries = engine.scan_directory_fast(temp.path(), 0).unwrap();
        assert_eq!(entries.len(), 4);

        let entries = engine.scan_directory_fast(temp.path(), 7).unwrap();
        assert_eq!(entries.len(), 7);
    }

    #[test]
    fn test_new_selects_some_backend() {
        let engine = ScanEngine::with_defaults().unwrap();
        assert!(!engine.backend_version().is_empty());
        // Priority order puts the native backend first when available.
        assert_eq!(engine.backend_kind(), BackendKind::Native);
    }
}

//! Backend registry and selection.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use fathom_core::{BackendChoice, BackendKind, ScanError};

use crate::backend::ScanBackend;
use crate::boundary::BoundaryBackend;
use crate::native;
use crate::readdir::ReadDirBackend;

type Constructor = fn() -> Result<Arc<dyn ScanBackend>, ScanError>;

fn construct_native() -> Result<Arc<dyn ScanBackend>, ScanError> {
    Ok(Arc::new(BoundaryBackend::probe(native::scanner_vtable())?))
}

fn construct_in_process() -> Result<Arc<dyn ScanBackend>, ScanError> {
    Ok(Arc::new(ReadDirBackend::new()))
}

/// Availability of one backend kind, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    /// Which backend was probed.
    pub kind: BackendKind,
    /// Whether it could be constructed.
    pub available: bool,
    /// Its version when available, the probe error otherwise.
    pub detail: String,
}

/// Priority-ordered registry of backend constructors.
///
/// Construction doubles as the availability probe: a constructor that
/// errors is skipped in priority order.
pub struct BackendRegistry {
    entries: Vec<(BackendKind, Constructor)>,
}

impl BackendRegistry {
    /// Registry with the built-in backends in priority order.
    pub fn new() -> Self {
        Self {
            entries: vec![
                (BackendKind::Native, construct_native as Constructor),
                (BackendKind::InProcess, construct_in_process as Constructor),
            ],
        }
    }

    /// Pick a backend per the configured policy.
    ///
    /// `Auto` takes the first available entry. A forced backend that
    /// fails its probe falls back to in-process with a warning rather
    /// than erroring; `BackendUnavailable` is reserved for a registry
    /// with nothing constructible at all.
    pub fn select(&self, choice: BackendChoice) -> Result<Arc<dyn ScanBackend>, ScanError> {
        match choice {
            BackendChoice::Auto => self.first_available(),
            BackendChoice::Forced(kind) => match self.construct(kind) {
                Ok(backend) => Ok(backend),
                Err(err) => {
                    warn!(backend = %kind, %err, "forced backend unavailable, falling back");
                    self.construct(BackendKind::InProcess)
                }
            },
        }
    }

    /// Probe every registered backend.
    pub fn availability(&self) -> Vec<BackendStatus> {
        self.entries
            .iter()
            .map(|(kind, constructor)| match constructor() {
                Ok(backend) => BackendStatus {
                    kind: *kind,
                    available: true,
                    detail: backend.version(),
                },
                Err(err) => BackendStatus {
                    kind: *kind,
                    available: false,
                    detail: err.to_string(),
                },
            })
            .collect()
    }

    fn first_available(&self) -> Result<Arc<dyn ScanBackend>, ScanError> {
        for (kind, constructor) in &self.entries {
            match constructor() {
                Ok(backend) => {
                    debug!(backend = %kind, "selected scan backend");
                    return Ok(backend);
                }
                Err(err) => warn!(backend = %kind, %err, "scan backend unavailable"),
            }
        }
        Err(ScanError::BackendUnavailable {
            name: "auto".to_string(),
        })
    }

    fn construct(&self, kind: BackendKind) -> Result<Arc<dyn ScanBackend>, ScanError> {
        let (_, constructor) = self
            .entries
            .iter()
            .find(|(k, _)| *k == kind)
            .ok_or_else(|| ScanError::BackendUnavailable {
                name: kind.to_string(),
            })?;
        constructor()
    }

    #[cfg(test)]
    fn with_entries(entries: Vec<(BackendKind, Constructor)>) -> Self {
        Self { entries }
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn construct_failing() -> Result<Arc<dyn ScanBackend>, ScanError> {
        Err(ScanError::BackendUnavailable {
            name: BackendKind::Native.to_string(),
        })
    }

    fn broken_native_registry() -> BackendRegistry {
        BackendRegistry::with_entries(vec![
            (BackendKind::Native, construct_failing as Constructor),
            (BackendKind::InProcess, construct_in_process as Constructor),
        ])
    }

    #[test]
    fn test_auto_prefers_native() {
        let backend = BackendRegistry::new().select(BackendChoice::Auto).unwrap();
        assert_eq!(backend.kind(), BackendKind::Native);
    }

    #[test]
    fn test_auto_falls_back_when_native_probe_fails() {
        let backend = broken_native_registry()
            .select(BackendChoice::Auto)
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::InProcess);
    }

    #[test]
    fn test_forced_available_backend_is_honored() {
        let backend = BackendRegistry::new()
            .select(BackendChoice::Forced(BackendKind::InProcess))
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::InProcess);
    }

    #[test]
    fn test_forced_unavailable_backend_falls_back() {
        let backend = broken_native_registry()
            .select(BackendChoice::Forced(BackendKind::Native))
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::InProcess);
    }

    #[test]
    fn test_empty_registry_reports_unavailable() {
        let err = BackendRegistry::with_entries(Vec::new())
            .select(BackendChoice::Auto)
            .err()
            .unwrap();
        assert!(matches!(err, ScanError::BackendUnavailable { .. }));
    }

    #[test]
    fn test_availability_reports_every_kind() {
        let statuses = broken_native_registry().availability();
        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].available);
        assert!(statuses[1].available);
        assert!(statuses[1].detail.contains("in-process"));
    }
}

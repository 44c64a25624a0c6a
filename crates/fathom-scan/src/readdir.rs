//! Blocking in-process backend built on `std::fs`.

use std::fs;
use std::path::Path;

use tracing::debug;

use fathom_core::{BackendKind, ScanEntry, ScanError};

use crate::backend::{ScanBackend, ScanContext};

/// Always-available backend that enumerates a directory with blocking
/// OS calls on the worker thread. It is the selector's priority floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadDirBackend;

impl ReadDirBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl ScanBackend for ReadDirBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InProcess
    }

    fn version(&self) -> String {
        format!("in-process {}", env!("CARGO_PKG_VERSION"))
    }

    fn scan(&self, path: &Path, ctx: &ScanContext) -> Result<Vec<ScanEntry>, ScanError> {
        enumerate(path, 0, ctx)
    }

    fn scan_fast(
        &self,
        path: &Path,
        cap: usize,
        ctx: &ScanContext,
    ) -> Result<Vec<ScanEntry>, ScanError> {
        enumerate(path, cap, ctx)
    }
}

/// Enumerate one directory level. A `cap` of 0 means unlimited.
///
/// Runs in two phases: names are collected first so the total is known
/// before any stat work, then each name is stat'ed individually. An
/// entry whose metadata cannot be read is skipped without failing the
/// scan; directory-level failures abort it.
pub(crate) fn enumerate(
    path: &Path,
    cap: usize,
    ctx: &ScanContext,
) -> Result<Vec<ScanEntry>, ScanError> {
    let meta = fs::symlink_metadata(path).map_err(|e| ScanError::io(path, e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory {
            path: path.to_path_buf(),
        });
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| ScanError::io(path, e))? {
        if ctx.is_cancelled() {
            return Err(ScanError::Interrupted);
        }
        let entry = entry.map_err(|e| ScanError::io(path, e))?;
        names.push(entry.file_name());
        if cap != 0 && names.len() == cap {
            break;
        }
    }
    ctx.set_total(names.len() as u64);

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        if ctx.is_cancelled() {
            return Err(ScanError::Interrupted);
        }
        let entry_path = path.join(&name);
        match fs::symlink_metadata(&entry_path) {
            Ok(metadata) => {
                let name = name.to_string_lossy().to_string();
                entries.push(ScanEntry::from_metadata(name, &metadata));
            }
            Err(err) => {
                debug!(path = %entry_path.display(), %err, "skipping unreadable entry");
            }
        }
        ctx.advance();
    }

    Ok(entries)
}

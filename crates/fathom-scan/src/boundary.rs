//! Stable boundary between the engine and handle-based scanner workers.
//!
//! The engine drives a foreign scanner through an opaque 64-bit handle
//! and a small table of C functions: start, poll state, poll progress,
//! cancel, two entry accessors, destroy. Everything the two sides
//! exchange crosses this table; nothing else about the worker is
//! visible. The built-in implementation lives in [`crate::native`],
//! but any scanner exporting the same table can be slotted in.

use std::ffi::{CStr, CString, c_char};
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fathom_core::{BackendKind, ScanEntry, ScanError, ScanState};

use crate::backend::{ScanBackend, ScanContext};
use crate::handle::POLL_INTERVAL;

/// Opaque scanner handle. Zero is the null handle.
pub type RawHandle = u64;

/// Scan states as they cross the boundary.
pub const RAW_STATE_IDLE: i32 = 0;
pub const RAW_STATE_SCANNING: i32 = 1;
pub const RAW_STATE_DONE: i32 = 2;
pub const RAW_STATE_CANCELLED: i32 = 3;
pub const RAW_STATE_FAILED: i32 = 4;

/// Map a state to its boundary representation.
pub fn state_to_raw(state: ScanState) -> i32 {
    match state {
        ScanState::Idle => RAW_STATE_IDLE,
        ScanState::Scanning => RAW_STATE_SCANNING,
        ScanState::Done => RAW_STATE_DONE,
        ScanState::Cancelled => RAW_STATE_CANCELLED,
        ScanState::Failed => RAW_STATE_FAILED,
    }
}

/// Map a boundary state back. Unknown values read as `Failed`.
pub fn state_from_raw(raw: i32) -> ScanState {
    match raw {
        RAW_STATE_IDLE => ScanState::Idle,
        RAW_STATE_SCANNING => ScanState::Scanning,
        RAW_STATE_DONE => ScanState::Done,
        RAW_STATE_CANCELLED => ScanState::Cancelled,
        _ => ScanState::Failed,
    }
}

/// Per-entry attributes marshalled across the boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawEntryAttrs {
    /// Entry name, NUL-terminated. Valid until the next accessor call
    /// on the same handle.
    pub name: *const c_char,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Modification time as Unix seconds; 0 or negative means unknown.
    pub mtime_secs: i64,
    pub is_dir: u8,
    pub executable: u8,
    pub hidden: u8,
}

impl Default for RawEntryAttrs {
    fn default() -> Self {
        Self {
            name: std::ptr::null(),
            size: 0,
            mtime_secs: 0,
            is_dir: 0,
            executable: 0,
            hidden: 0,
        }
    }
}

/// Function table a scanner implementation exports.
///
/// Name pointers written by `entry_attrs` stay valid only until the
/// next call on the same handle; `version` pointers must stay valid
/// for the process lifetime.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ScannerVtable {
    /// Allocate a session. Returns the null handle when the
    /// implementation is unavailable.
    pub create: extern "C" fn() -> RawHandle,
    /// Begin scanning a NUL-terminated path with an entry cap
    /// (0 = unlimited). Returns 0 on acceptance, negative on an invalid
    /// handle or restart.
    pub start: extern "C" fn(RawHandle, *const c_char, u64) -> i32,
    pub poll_state: extern "C" fn(RawHandle) -> i32,
    pub poll_progress: extern "C" fn(RawHandle, *mut u64, *mut u64),
    pub cancel: extern "C" fn(RawHandle),
    /// Entry count once the session is done; 0 otherwise.
    pub entry_count: extern "C" fn(RawHandle) -> u64,
    /// Fills the out parameter; returns 0 on success.
    pub entry_attrs: extern "C" fn(RawHandle, u64, *mut RawEntryAttrs) -> i32,
    pub destroy: extern "C" fn(RawHandle),
    pub version: extern "C" fn() -> *const c_char,
}

/// Owns one raw scanner session, destroying it exactly once on drop.
pub struct BoundaryScanner {
    vtable: &'static ScannerVtable,
    handle: RawHandle,
}

impl BoundaryScanner {
    /// Allocate a session. `None` when the scanner is unavailable.
    pub fn create(vtable: &'static ScannerVtable) -> Option<Self> {
        let handle = (vtable.create)();
        (handle != 0).then_some(Self { vtable, handle })
    }

    /// Begin scanning `path` with an entry cap (0 = unlimited).
    pub fn start(&self, path: &Path, cap: u64) -> Result<(), ScanError> {
        let c_path = CString::new(path.to_string_lossy().into_owned())
            .map_err(|_| ScanError::other("path contains a NUL byte"))?;
        let rc = (self.vtable.start)(self.handle, c_path.as_ptr(), cap);
        if rc != 0 {
            return Err(ScanError::other(format!("scanner rejected start (rc {rc})")));
        }
        Ok(())
    }

    /// Poll the session state.
    pub fn state(&self) -> ScanState {
        state_from_raw((self.vtable.poll_state)(self.handle))
    }

    /// Poll the progress counters as `(current, total)`.
    pub fn progress(&self) -> (u64, u64) {
        let mut current = 0u64;
        let mut total = 0u64;
        (self.vtable.poll_progress)(self.handle, &mut current, &mut total);
        (current, total)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        (self.vtable.cancel)(self.handle);
    }

    /// Materialize the finished session's entries.
    pub fn entries(&self) -> Result<Vec<ScanEntry>, ScanError> {
        let count = (self.vtable.entry_count)(self.handle);
        let mut entries = Vec::with_capacity(count as usize);
        for index in 0..count {
            let mut attrs = RawEntryAttrs::default();
            if (self.vtable.entry_attrs)(self.handle, index, &mut attrs) != 0 {
                return Err(ScanError::other(format!(
                    "scanner returned no attributes for entry {index}"
                )));
            }
            if attrs.name.is_null() {
                return Err(ScanError::other(format!(
                    "scanner returned no name for entry {index}"
                )));
            }
            // Copy the name out before the next call invalidates it.
            let name = unsafe { CStr::from_ptr(attrs.name) }
                .to_string_lossy()
                .into_owned();
            entries.push(entry_from_raw(name, &attrs));
        }
        Ok(entries)
    }
}

impl Drop for BoundaryScanner {
    fn drop(&mut self) {
        (self.vtable.destroy)(self.handle);
    }
}

fn entry_from_raw(name: String, attrs: &RawEntryAttrs) -> ScanEntry {
    let modified = if attrs.mtime_secs > 0 {
        UNIX_EPOCH + Duration::from_secs(attrs.mtime_secs as u64)
    } else {
        SystemTime::now()
    };
    ScanEntry {
        hidden: attrs.hidden != 0,
        executable: attrs.executable != 0,
        is_dir: attrs.is_dir != 0,
        size: attrs.size,
        modified,
        name: name.into(),
    }
}

/// Backend that drives a scanner across the boundary.
///
/// The worker thread still belongs to the engine-side handle; this
/// backend spends it polling the foreign session at the same cadence
/// `wait` uses, mirroring its counters into the [`ScanContext`].
pub struct BoundaryBackend {
    vtable: &'static ScannerVtable,
}

impl BoundaryBackend {
    /// Probe the scanner. A vtable whose `create` returns the null
    /// handle is unavailable.
    pub fn probe(vtable: &'static ScannerVtable) -> Result<Self, ScanError> {
        match BoundaryScanner::create(vtable) {
            Some(_probe) => Ok(Self { vtable }),
            None => Err(ScanError::BackendUnavailable {
                name: BackendKind::Native.to_string(),
            }),
        }
    }

    fn drive(&self, path: &Path, cap: usize, ctx: &ScanContext) -> Result<Vec<ScanEntry>, ScanError> {
        // Validate the path here: the boundary has no error-message
        // accessor, so path problems must be diagnosed before start.
        let meta = std::fs::symlink_metadata(path).map_err(|e| ScanError::io(path, e))?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let scanner = BoundaryScanner::create(self.vtable).ok_or_else(|| {
            ScanError::BackendUnavailable {
                name: BackendKind::Native.to_string(),
            }
        })?;
        scanner.start(path, cap as u64)?;

        loop {
            if ctx.is_cancelled() {
                scanner.cancel();
            }
            let (current, total) = scanner.progress();
            ctx.set_total(total);
            ctx.set_current(current);

            match scanner.state() {
                ScanState::Done => break,
                ScanState::Cancelled => return Err(ScanError::Interrupted),
                ScanState::Failed => {
                    return Err(ScanError::other(format!(
                        "native scanner failed: {}",
                        path.display()
                    )));
                }
                ScanState::Idle | ScanState::Scanning => thread::sleep(POLL_INTERVAL),
            }
        }

        let (current, total) = scanner.progress();
        ctx.set_total(total);
        ctx.set_current(current);
        scanner.entries()
    }
}

impl ScanBackend for BoundaryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn version(&self) -> String {
        let ptr = (self.vtable.version)();
        if ptr.is_null() {
            return "unknown".to_string();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn scan(&self, path: &Path, ctx: &ScanContext) -> Result<Vec<ScanEntry>, ScanError> {
        self.drive(path, 0, ctx)
    }

    fn scan_fast(
        &self,
        path: &Path,
        cap: usize,
        ctx: &ScanContext,
    ) -> Result<Vec<ScanEntry>, ScanError> {
        self.drive(path, cap, ctx)
    }
}

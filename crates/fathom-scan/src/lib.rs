//! Asynchronous directory scanning for fathom.
//!
//! This crate is the scan engine behind fathom's directory listings:
//! scans run on background workers, callers poll state and progress
//! without blocking, cancel mid-flight, and collect entries when a scan
//! completes.
//!
//! # Overview
//!
//! - **Backends** implement one capability set ([`ScanBackend`]): the
//!   always-available in-process [`ReadDirBackend`], and the
//!   [`BoundaryBackend`] that drives a scanner across a stable C
//!   function table (the built-in one lives behind
//!   [`native_scanner_vtable`]).
//! - **[`ScanHandle`]** owns one scan and its
//!   `Idle -> Scanning -> {Done, Cancelled, Failed}` lifecycle.
//! - **[`BackendRegistry`]** picks the best available backend with
//!   graceful fallback; [`ScanEngine`] does the selection once and
//!   mints handles.
//! - **[`ParallelScanner`]** fans path batches over a bounded pool,
//!   one result per path.
//! - **[`ScanTask`]** adapts a handle for async callers.
//!
//! # Example
//!
//! ```rust,no_run
//! use fathom_scan::{ScanEngine, ScanState};
//!
//! let engine = ScanEngine::with_defaults()?;
//!
//! // Asynchronous: poll while doing other work.
//! let handle = engine.begin("/home/user")?;
//! while !handle.state().is_terminal() {
//!     let p = handle.progress();
//!     println!("{}/{}", p.current, p.total);
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! if handle.state() == ScanState::Done {
//!     for entry in handle.results()? {
//!         println!("{}", entry.name);
//!     }
//! }
//! # Ok::<(), fathom_scan::ScanError>(())
//! ```
//!
//! # Parallel scans
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use fathom_scan::ScanEngine;
//!
//! let engine = ScanEngine::with_defaults()?;
//! let paths: Vec<PathBuf> = vec!["/etc".into(), "/var/log".into()];
//! for result in engine.parallel().scan_all(&paths) {
//!     println!("{}: {} entries", result.path.display(), result.len());
//! }
//! # Ok::<(), fathom_scan::ScanError>(())
//! ```

mod backend;
mod boundary;
mod engine;
mod handle;
mod native;
mod parallel;
mod readdir;
mod selector;
mod task;

pub use backend::{ScanBackend, ScanContext};
pub use boundary::{
    BoundaryBackend, BoundaryScanner, RAW_STATE_CANCELLED, RAW_STATE_DONE, RAW_STATE_FAILED,
    RAW_STATE_IDLE, RAW_STATE_SCANNING, RawEntryAttrs, RawHandle, ScannerVtable, state_from_raw,
    state_to_raw,
};
pub use engine::ScanEngine;
pub use handle::ScanHandle;
pub use native::{DISABLE_NATIVE_ENV, scanner_vtable as native_scanner_vtable};
pub use parallel::ParallelScanner;
pub use readdir::ReadDirBackend;
pub use selector::{BackendRegistry, BackendStatus};
pub use task::ScanTask;

// Re-export core types for convenience
pub use fathom_core::{
    BackendChoice, BackendKind, EngineConfig, ScanEntry, ScanError, ScanProgress, ScanResult,
    ScanState, sort_for_display,
};

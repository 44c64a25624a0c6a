//! Built-in implementation of the scanner boundary.
//!
//! Sessions live in a process-wide registry keyed by raw handle; the
//! exported table functions look them up and drive them. The worker
//! enumerates with the same readdir code as the in-process backend, so
//! the two backends differ only in how they are driven. Setting
//! [`DISABLE_NATIVE_ENV`] makes `create` report unavailability, which
//! exercises the selector's fallback path.

use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use tracing::debug;

use fathom_core::{ScanEntry, ScanError, ScanState};

use crate::backend::ScanContext;
use crate::boundary::{RawEntryAttrs, RawHandle, ScannerVtable, state_to_raw};
use crate::readdir;

/// Environment variable that makes the built-in scanner unavailable.
pub const DISABLE_NATIVE_ENV: &str = "FATHOM_DISABLE_NATIVE";

struct Session {
    ctx: ScanContext,
    state: Mutex<SessionState>,
    // Name scratch; the pointer written into RawEntryAttrs stays
    // valid until the next entry_attrs call on this session.
    name_buf: Mutex<CString>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

struct SessionState {
    state: ScanState,
    entries: Vec<ScanEntry>,
}

impl Session {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ctx: ScanContext::new(),
            state: Mutex::new(SessionState {
                state: ScanState::Idle,
                entries: Vec::new(),
            }),
            name_buf: Mutex::new(CString::default()),
            worker: Mutex::new(None),
        })
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static SESSIONS: OnceLock<Mutex<HashMap<RawHandle, Arc<Session>>>> = OnceLock::new();

fn sessions() -> &'static Mutex<HashMap<RawHandle, Arc<Session>>> {
    SESSIONS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn get(handle: RawHandle) -> Option<Arc<Session>> {
    sessions().lock().get(&handle).cloned()
}

extern "C" fn create() -> RawHandle {
    if std::env::var_os(DISABLE_NATIVE_ENV).is_some() {
        return 0;
    }
    let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    sessions().lock().insert(handle, Session::new());
    handle
}

extern "C" fn start(handle: RawHandle, path: *const c_char, cap: u64) -> i32 {
    let Some(session) = get(handle) else {
        return -1;
    };
    if path.is_null() {
        return -1;
    }
    let path = PathBuf::from(
        unsafe { CStr::from_ptr(path) }
            .to_string_lossy()
            .into_owned(),
    );

    {
        let mut state = session.state.lock();
        if state.state != ScanState::Idle {
            return -2;
        }
        state.state = ScanState::Scanning;
    }

    let worker_session = Arc::clone(&session);
    let spawned = thread::Builder::new()
        .name("fathom-native".into())
        .spawn(move || {
            let outcome = readdir::enumerate(&path, cap as usize, &worker_session.ctx);
            let mut state = worker_session.state.lock();
            // Only Scanning commits; cancel and destroy win any race.
            if state.state != ScanState::Scanning {
                return;
            }
            match outcome {
                Ok(entries) => {
                    state.entries = entries;
                    state.state = ScanState::Done;
                }
                Err(ScanError::Interrupted) => state.state = ScanState::Cancelled,
                Err(err) => {
                    debug!(%err, "native scan failed");
                    state.state = ScanState::Failed;
                }
            }
        });

    match spawned {
        Ok(join) => {
            *session.worker.lock() = Some(join);
            0
        }
        Err(_) => {
            session.state.lock().state = ScanState::Failed;
            -3
        }
    }
}

extern "C" fn poll_state(handle: RawHandle) -> i32 {
    match get(handle) {
        Some(session) => state_to_raw(session.state.lock().state),
        None => state_to_raw(ScanState::Failed),
    }
}

extern "C" fn poll_progress(handle: RawHandle, current: *mut u64, total: *mut u64) {
    let progress = get(handle).map(|s| s.ctx.progress()).unwrap_or_default();
    if !current.is_null() {
        unsafe { *current = progress.current };
    }
    if !total.is_null() {
        unsafe { *total = progress.total };
    }
}

extern "C" fn cancel(handle: RawHandle) {
    if let Some(session) = get(handle) {
        let mut state = session.state.lock();
        if state.state == ScanState::Scanning {
            session.ctx.cancel();
            state.state = ScanState::Cancelled;
        }
    }
}

extern "C" fn entry_count(handle: RawHandle) -> u64 {
    get(handle)
        .map(|session| {
            let state = session.state.lock();
            if state.state == ScanState::Done {
                state.entries.len() as u64
            } else {
                0
            }
        })
        .unwrap_or(0)
}

extern "C" fn entry_attrs(handle: RawHandle, index: u64, out: *mut RawEntryAttrs) -> i32 {
    if out.is_null() {
        return -1;
    }
    let Some(session) = get(handle) else {
        return -1;
    };
    let state = session.state.lock();
    let Some(entry) = state.entries.get(index as usize) else {
        return -1;
    };
    let Ok(c_name) = CString::new(entry.name.as_bytes()) else {
        return -1;
    };
    let mut buf = session.name_buf.lock();
    *buf = c_name;
    let attrs = RawEntryAttrs {
        name: buf.as_ptr(),
        size: entry.size,
        mtime_secs: entry
            .modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        is_dir: entry.is_dir as u8,
        executable: entry.executable as u8,
        hidden: entry.hidden as u8,
    };
    unsafe { *out = attrs };
    0
}

extern "C" fn destroy(handle: RawHandle) {
    let session = sessions().lock().remove(&handle);
    if let Some(session) = session {
        {
            let mut state = session.state.lock();
            if state.state == ScanState::Scanning {
                session.ctx.cancel();
                state.state = ScanState::Cancelled;
            }
        }
        // Join outside the registry lock; the worker never takes it.
        if let Some(worker) = session.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

extern "C" fn version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();
    VERSION
        .get_or_init(|| {
            CString::new(format!("fathom-native {}", env!("CARGO_PKG_VERSION")))
                .unwrap_or_default()
        })
        .as_ptr()
}

/// The built-in scanner's function table.
pub fn scanner_vtable() -> &'static ScannerVtable {
    static VTABLE: ScannerVtable = ScannerVtable {
        create,
        start,
        poll_state,
        poll_progress,
        cancel,
        entry_count,
        entry_attrs,
        destroy,
        version,
    };
    &VTABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{BoundaryScanner, RAW_STATE_FAILED};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn wait_done(scanner: &BoundaryScanner) -> ScanState {
        for _ in 0..500 {
            let state = scanner.state();
            if state.is_terminal() {
                return state;
            }
            thread::sleep(Duration::from_millis(5));
        }
        scanner.state()
    }

    #[test]
    fn test_session_scans_through_the_table() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "one").unwrap();
        fs::write(temp.path().join("b.txt"), "two").unwrap();

        let scanner = BoundaryScanner::create(scanner_vtable()).unwrap();
        scanner.start(temp.path(), 0).unwrap();

        assert_eq!(wait_done(&scanner), ScanState::Done);

        let (current, total) = scanner.progress();
        assert_eq!((current, total), (2, 2));

        let mut entries = scanner.entries().unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name.as_str(), "a.txt");
        assert_eq!(entries[0].size, 3);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let temp = TempDir::new().unwrap();
        let scanner = BoundaryScanner::create(scanner_vtable()).unwrap();
        scanner.start(temp.path(), 0).unwrap();
        assert!(scanner.start(temp.path(), 0).is_err());
    }

    #[test]
    fn test_missing_directory_fails_the_session() {
        let scanner = BoundaryScanner::create(scanner_vtable()).unwrap();
        scanner.start("/does/not/exist".as_ref(), 0).unwrap();
        assert_eq!(wait_done(&scanner), ScanState::Failed);
        assert_eq!((scanner_vtable().entry_count)(0), 0);
    }

    #[test]
    fn test_destroyed_handles_read_as_failed() {
        let vtable = scanner_vtable();
        let handle = (vtable.create)();
        assert_ne!(handle, 0);
        (vtable.destroy)(handle);
        assert_eq!((vtable.poll_state)(handle), RAW_STATE_FAILED);
        // Double destroy is a no-op.
        (vtable.destroy)(handle);
    }

    #[test]
    fn test_cancel_discards_results() {
        let temp = TempDir::new().unwrap();
        for i in 0..50 {
            fs::write(temp.path().join(format!("f{i:03}")), "x").unwrap();
        }

        let vtable = scanner_vtable();
        let scanner = BoundaryScanner::create(vtable).unwrap();
        scanner.start(temp.path(), 0).unwrap();
        scanner.cancel();

        // The worker may already have finished; either way a cancelled
        // session must surface no entries.
        match wait_done(&scanner) {
            ScanState::Cancelled => assert!(scanner.entries().unwrap().is_empty()),
            ScanState::Done => assert_eq!(scanner.entries().unwrap().len(), 50),
            other => panic!("unexpected terminal state {other}"),
        }
    }
}

//! The backend capability set and the worker-side scan context.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use fathom_core::{BackendKind, ScanEntry, ScanError, ScanProgress};

/// Shared counters and cancel flag for one scan.
///
/// The handle creates a context and hands it to the backend worker; it
/// keeps a clone to answer `progress()` and `cancel()` without touching
/// the worker. All accesses are lock-free.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Default)]
struct ContextInner {
    current: AtomicU64,
    total: AtomicU64,
    cancelled: AtomicBool,
}

impl ScanContext {
    /// Create a fresh context with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
    }

    /// Record the expected entry count.
    pub fn set_total(&self, total: u64) {
        self.inner.total.store(total, Ordering::Relaxed);
    }

    /// Record one processed entry.
    pub fn advance(&self) {
        self.inner.current.fetch_add(1, Ordering::Relaxed);
    }

    /// Raise `current` to an absolute value, for backends that mirror a
    /// foreign worker's counter. Never moves the counter backwards.
    pub fn set_current(&self, current: u64) {
        self.inner.current.fetch_max(current, Ordering::Relaxed);
    }

    /// Snapshot the progress counters.
    pub fn progress(&self) -> ScanProgress {
        ScanProgress {
            current: self.inner.current.load(Ordering::Relaxed),
            total: self.inner.total.load(Ordering::Relaxed),
        }
    }
}

/// The capability set every scan backend implements.
///
/// A backend enumerates exactly one directory level. It reports the
/// expected entry count through [`ScanContext::set_total`] as soon as
/// it is known, bumps [`ScanContext::advance`] per processed entry, and
/// checks [`ScanContext::is_cancelled`] at least once per entry,
/// bailing with [`ScanError::Interrupted`] when it is set.
pub trait ScanBackend: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Human-readable backend version.
    fn version(&self) -> String;

    /// Enumerate every entry of `path`.
    fn scan(&self, path: &Path, ctx: &ScanContext) -> Result<Vec<ScanEntry>, ScanError>;

    /// Enumerate at most `cap` entries of `path`. A cap of 0 means
    /// unlimited.
    fn scan_fast(
        &self,
        path: &Path,
        cap: usize,
        ctx: &ScanContext,
    ) -> Result<Vec<ScanEntry>, ScanError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_starts_zeroed() {
        let ctx = ScanContext::new();
        let progress = ctx.progress();
        assert_eq!(progress.current, 0);
        assert_eq!(progress.total, 0);
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_context_counters() {
        let ctx = ScanContext::new();
        ctx.set_total(3);
        ctx.advance();
        ctx.advance();

        let progress = ctx.progress();
        assert_eq!(progress.current, 2);
        assert_eq!(progress.total, 3);
    }

    #[test]
    fn test_set_current_never_regresses() {
        let ctx = ScanContext::new();
        ctx.set_current(10);
        ctx.set_current(4);
        assert_eq!(ctx.progress().current, 10);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let ctx = ScanContext::new();
        ctx.cancel();
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = ScanContext::new();
        let clone = ctx.clone();
        clone.cancel();
        clone.advance();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.progress().current, 1);
    }
}

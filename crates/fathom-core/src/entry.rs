//! Directory entry and scan result types.

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Metadata for a single entry in a scanned directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Entry name (not full path).
    pub name: CompactString,

    /// Whether the entry is a directory.
    pub is_dir: bool,

    /// Size in bytes (0 for directories).
    pub size: u64,

    /// Last modification time, best-effort.
    pub modified: SystemTime,

    /// Whether any execute permission bit is set.
    pub executable: bool,

    /// Whether the name begins with a dot.
    pub hidden: bool,
}

impl ScanEntry {
    /// Build an entry from a name and its filesystem metadata.
    ///
    /// Falls back to the current time when the modification time cannot
    /// be read (some filesystems do not report one).
    pub fn from_metadata(name: impl Into<CompactString>, metadata: &Metadata) -> Self {
        let name = name.into();
        let is_dir = metadata.is_dir();
        Self {
            hidden: name.starts_with('.'),
            executable: is_executable(metadata),
            size: if is_dir { 0 } else { metadata.len() },
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            is_dir,
            name,
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &Metadata) -> bool {
    false
}

/// Sort entries for display: directories first, then case-insensitive
/// by name. Backends return entries in enumeration order; callers that
/// render listings apply this.
pub fn sort_for_display(entries: &mut [ScanEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Outcome of scanning exactly one directory.
///
/// `success` and `error` move together: a successful result never
/// carries an error and a failed one always does. The constructors
/// below are the only way the engine builds one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// The directory that was scanned.
    pub path: PathBuf,

    /// Entries enumerated from the directory (empty on failure).
    pub entries: Vec<ScanEntry>,

    /// Whether the scan completed successfully.
    pub success: bool,

    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl ScanResult {
    /// Package a successful scan.
    pub fn ok(path: impl Into<PathBuf>, entries: Vec<ScanEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
            success: true,
            error: None,
        }
    }

    /// Package a failed scan. Failed scans carry no entries.
    pub fn failed(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Number of entries in the result.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the result holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, is_dir: bool) -> ScanEntry {
        ScanEntry {
            name: name.into(),
            is_dir,
            size: 0,
            modified: SystemTime::now(),
            executable: false,
            hidden: name.starts_with('.'),
        }
    }

    #[test]
    fn test_result_constructors_keep_success_and_error_in_step() {
        let ok = ScanResult::ok("/tmp", vec![entry("a", false)]);
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.len(), 1);

        let failed = ScanResult::failed("/tmp/missing", "Path not found: /tmp/missing");
        assert!(!failed.success);
        assert!(failed.error.is_some());
        assert!(failed.is_empty());
    }

    #[test]
    fn test_sort_for_display_groups_directories_first() {
        let mut entries = vec![
            entry("zeta.txt", false),
            entry("Alpha", true),
            entry("beta.txt", false),
            entry("omega", true),
        ];
        sort_for_display(&mut entries);

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "omega", "beta.txt", "zeta.txt"]);
    }

    #[test]
    fn test_hidden_follows_leading_dot() {
        assert!(entry(".git", true).hidden);
        assert!(!entry("git", true).hidden);
    }
}

//! Extraction operation reporting.
//!
//! Recoverable problems never abort an extraction. They are recorded here so
//! callers can tell a faithful extraction from a degraded one.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Why an archive entry was not materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry (or its hard-link target) resolves outside the destination.
    PathTraversal,
    /// The tar type flag is not a directory, file, symlink or hard link.
    UnsupportedKind {
        /// Raw tar type flag byte.
        type_flag: u8,
    },
    /// Neither linking nor copying could produce the hard link.
    HardlinkTargetUnavailable {
        /// Resolved target path.
        target: PathBuf,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTraversal => write!(f, "path escapes destination"),
            Self::UnsupportedKind { type_flag } => {
                write!(f, "unsupported entry type {:?}", char::from(*type_flag))
            }
            Self::HardlinkTargetUnavailable { target } => {
                write!(f, "hard link target unavailable: {}", target.display())
            }
        }
    }
}

/// An archive entry that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Entry name as stored in the archive.
    pub name: PathBuf,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// A materialized entry that lost some fidelity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// A hard link was materialized as an independent copy.
    HardlinkCopied {
        /// The new path.
        path: PathBuf,
    },
    /// Only owner permission bits could be applied.
    PermissionsDegraded {
        /// The affected path.
        path: PathBuf,
        /// The mode from the archive.
        mode: u32,
    },
    /// No permission strategy succeeded.
    PermissionsFailed {
        /// The affected path.
        path: PathBuf,
        /// The mode from the archive.
        mode: u32,
    },
    /// The modification time could not be applied.
    Timestamp {
        /// The affected path.
        path: PathBuf,
    },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardlinkCopied { path } => {
                write!(f, "hard link copied instead of linked: {}", path.display())
            }
            Self::PermissionsDegraded { path, mode } => write!(
                f,
                "only owner permissions applied to {} (mode {mode:#o})",
                path.display()
            ),
            Self::PermissionsFailed { path, mode } => write!(
                f,
                "could not apply mode {mode:#o} to {}",
                path.display()
            ),
            Self::Timestamp { path } => {
                write!(f, "could not set modification time on {}", path.display())
            }
        }
    }
}

/// Report of a completed tar.xz extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Number of regular files written.
    pub files_extracted: usize,

    /// Number of directory entries materialized.
    pub directories_created: usize,

    /// Number of symlinks created.
    pub symlinks_created: usize,

    /// Number of hard links created (shared inode or copy).
    pub hardlinks_created: usize,

    /// Total content bytes written to disk.
    pub bytes_written: u64,

    /// Compressed bytes consumed from the source.
    pub bytes_read: u64,

    /// Duration of the extraction.
    pub duration: Duration,

    /// Entries that were not materialized.
    pub skipped: Vec<SkippedEntry>,

    /// Materialized entries that lost fidelity.
    pub degradations: Vec<Degradation>,
}

impl ExtractionReport {
    /// Creates a new empty extraction report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a skipped entry.
    pub fn add_skipped(&mut self, name: impl Into<PathBuf>, reason: SkipReason) {
        self.skipped.push(SkippedEntry {
            name: name.into(),
            reason,
        });
    }

    /// Records a degradation.
    pub fn add_degradation(&mut self, degradation: Degradation) {
        self.degradations.push(degradation);
    }

    /// Returns total number of entries materialized.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.files_extracted
            + self.directories_created
            + self.symlinks_created
            + self.hardlinks_created
    }

    /// Returns the number of path-traversal violations that were skipped.
    #[must_use]
    pub fn traversal_violations(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| s.reason == SkipReason::PathTraversal)
            .count()
    }

    /// Returns whether every entry was materialized without loss.
    #[must_use]
    pub fn is_faithful(&self) -> bool {
        self.skipped.is_empty() && self.degradations.is_empty()
    }
}

/// Callback trait for progress reporting during extraction.
///
/// The entry count of a tar stream is unknown until it has been read, so
/// `current` is the only position information available.
///
/// # Examples
///
/// ```
/// use rootstrap_core::ProgressCallback;
/// use std::path::Path;
///
/// struct SimpleProgress;
///
/// impl ProgressCallback for SimpleProgress {
///     fn on_entry_start(&mut self, path: &Path, current: usize) {
///         println!("#{current}: {}", path.display());
///     }
///
///     fn on_bytes_written(&mut self, _bytes: u64) {}
///
///     fn on_entry_complete(&mut self, _path: &Path) {}
///
///     fn on_complete(&mut self) {
///         println!("done");
///     }
/// }
/// ```
pub trait ProgressCallback {
    /// Called when an entry is read from the archive (1-indexed).
    fn on_entry_start(&mut self, path: &Path, current: usize);

    /// Called after content bytes were written.
    fn on_bytes_written(&mut self, bytes: u64);

    /// Called when an entry has been processed, materialized or skipped.
    fn on_entry_complete(&mut self, path: &Path);

    /// Called once when the archive has been fully consumed.
    fn on_complete(&mut self);
}

/// No-op implementation of `ProgressCallback`.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_entry_start(&mut self, _path: &Path, _current: usize) {}

    fn on_bytes_written(&mut self, _bytes: u64) {}

    fn on_entry_complete(&mut self, _path: &Path) {}

    fn on_complete(&mut self) {}
}

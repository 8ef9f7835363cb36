//! Best-effort modification time application.

use std::path::Path;

use filetime::FileTime;
use tracing::debug;

/// Applies header modification times.
#[derive(Debug, Clone, Copy)]
pub struct TimestampApplier {
    enabled: bool,
}

impl TimestampApplier {
    /// Creates an applier; a disabled one reports success without touching
    /// the filesystem.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Sets the mtime of `path`, following symlinks.
    ///
    /// Returns `false` if the time could not be applied.
    pub fn apply(self, path: &Path, mtime: u64) -> bool {
        if !self.enabled {
            return true;
        }
        filetime::set_file_mtime(path, to_file_time(mtime))
            .map_err(|e| debug!(path = %path.display(), error = %e, "failed to set mtime"))
            .is_ok()
    }

    /// Sets the mtime of a symlink itself.
    pub fn apply_to_symlink(self, path: &Path, mtime: u64) -> bool {
        if !self.enabled {
            return true;
        }
        let time = to_file_time(mtime);
        filetime::set_symlink_file_times(path, time, time)
            .map_err(|e| debug!(path = %path.display(), error = %e, "failed to set symlink mtime"))
            .is_ok()
    }
}

fn to_file_time(mtime: u64) -> FileTime {
    FileTime::from_unix_time(i64::try_from(mtime).unwrap_or(i64::MAX), 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_apply_sets_mtime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x").unwrap();

        assert!(TimestampApplier::new(true).apply(&path, 1_600_000_000));
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), 1_600_000_000);
    }

    #[test]
    fn test_missing_path_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        assert!(!TimestampApplier::new(true).apply(&temp.path().join("gone"), 1));
        assert!(TimestampApplier::new(false).apply(&temp.path().join("gone"), 1));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_mtime_leaves_target_alone() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target");
        fs::write(&target, "x").unwrap();
        filetime::set_file_mtime(&target, FileTime::from_unix_time(1_000, 0)).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink("target", &link).unwrap();

        assert!(TimestampApplier::new(true).apply_to_symlink(&link, 2_000));

        let link_meta = fs::symlink_metadata(&link).unwrap();
        let target_meta = fs::metadata(&target).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&link_meta).unix_seconds(), 2_000);
        assert_eq!(FileTime::from_last_modification_time(&target_meta).unix_seconds(), 1_000);
    }
}

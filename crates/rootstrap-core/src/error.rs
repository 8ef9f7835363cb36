//! Error types for tar.xz extraction.
//!
//! Only failures that abort an extraction live here. Problems that the engine
//! absorbs and reports (skipped entries, degraded permissions, hard links
//! turned into copies) are plain data, see [`crate::report`].

use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Fatal errors that abort an extraction.
///
/// When one of these is returned, whatever was materialized before the failure
/// is left on disk. Re-running the extraction is the supported way to resume.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The destination root could not be created or is not a directory.
    #[error("failed to create destination directory {path}: {source}")]
    DestinationCreation {
        /// The requested destination.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The archive source could not be opened.
    #[error("failed to open archive source '{name}': {source}")]
    SourceOpen {
        /// Name of the source.
        name: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The xz stream is corrupt or truncated.
    #[error("xz decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    /// The decompressed bytes are not a valid tar stream.
    #[error("malformed tar archive: {reason}")]
    MalformedArchive {
        /// What was wrong with the stream.
        reason: String,
    },

    /// The filesystem refused to create a symbolic link.
    #[error("failed to create symlink {path} -> {target}: {source}")]
    SymlinkUnsupported {
        /// Where the link was to be created.
        path: PathBuf,
        /// The raw link target from the archive.
        target: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Creating or writing a filesystem object failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being materialized.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
}

impl ExtractionError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedArchive {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the archive itself is corrupt, as opposed to the
    /// destination filesystem misbehaving.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstrap_core::ExtractionError;
    ///
    /// let err = ExtractionError::MalformedArchive {
    ///     reason: "bad header".to_string(),
    /// };
    /// assert!(err.is_corrupt_archive());
    /// ```
    #[must_use]
    pub const fn is_corrupt_archive(&self) -> bool {
        matches!(
            self,
            Self::Decompression(_) | Self::MalformedArchive { .. }
        )
    }

    /// Returns the filesystem path involved in this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::DestinationCreation { path, .. }
            | Self::SymlinkUnsupported { path, .. }
            | Self::Io { path, .. } => Some(path),
            Self::SourceOpen { .. } | Self::Decompression(_) | Self::MalformedArchive { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_destination_creation_display() {
        let err = ExtractionError::DestinationCreation {
            path: PathBuf::from("/ro/rootfs"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("destination directory"));
        assert!(msg.contains("/ro/rootfs"));
        assert_eq!(err.path(), Some(Path::new("/ro/rootfs")));
    }

    #[test]
    fn test_corrupt_archive_classification() {
        let err = ExtractionError::Decompression(io::Error::new(
            io::ErrorKind::InvalidData,
            "corrupt",
        ));
        assert!(err.is_corrupt_archive());
        assert!(err.path().is_none());

        let err = ExtractionError::malformed("truncated entry");
        assert!(err.is_corrupt_archive());
        assert!(err.to_string().contains("truncated entry"));

        let err = ExtractionError::SymlinkUnsupported {
            path: PathBuf::from("/dest/link"),
            target: PathBuf::from("a/b.txt"),
            source: io::Error::new(io::ErrorKind::Unsupported, "no symlinks"),
        };
        assert!(!err.is_corrupt_archive());
        assert!(err.to_string().contains("a/b.txt"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err = ExtractionError::io(
            Path::new("/dest/file"),
            io::Error::new(io::ErrorKind::StorageFull, "disk full"),
        );
        assert!(err.source().is_some());
        assert_eq!(err.path(), Some(Path::new("/dest/file")));
    }
}

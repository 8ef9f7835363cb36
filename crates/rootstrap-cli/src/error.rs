//! Error conversion utilities for CLI.
//!
//! Converts rootstrap-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use rootstrap_core::ExtractionError;
use std::io;
use std::path::Path;

/// Converts `ExtractionError` to user-friendly anyhow error with context
pub fn convert_extraction_error(err: ExtractionError, archive: &Path) -> anyhow::Error {
    match err {
        ExtractionError::DestinationCreation { path, source } => {
            anyhow!(
                "Cannot create destination directory '{}': {}\n\
                 HINT: Check that the parent directory exists and is writable.",
                path.display(),
                source
            )
        }
        ExtractionError::SourceOpen { name, source } => {
            anyhow!(
                "Cannot open archive '{}': {}\n\
                 HINT: Check the archive path. Use '-' to read from standard input.",
                name,
                source
            )
        }
        ExtractionError::Decompression(source) => {
            anyhow!(
                "Archive '{}' is not a valid xz stream: {}\n\
                 HINT: The archive may be truncated or corrupted. Files extracted before \
                 the failure were left in place; re-run with an intact archive to complete them.",
                archive.display(),
                source
            )
        }
        ExtractionError::MalformedArchive { reason } => {
            anyhow!(
                "Invalid tar data in '{}': {}\n\
                 HINT: The archive decompressed but does not contain a tar stream.",
                archive.display(),
                reason
            )
        }
        ExtractionError::SymlinkUnsupported {
            path,
            target,
            source,
        } => {
            anyhow!(
                "Cannot create symlink '{}' -> '{}' from '{}': {}\n\
                 HINT: The destination filesystem must support symbolic links.",
                path.display(),
                target.display(),
                archive.display(),
                source
            )
        }
        ExtractionError::Io { path, source } => {
            let hint = match source.kind() {
                io::ErrorKind::PermissionDenied => {
                    "\nHINT: The destination is not writable by the current user."
                }
                io::ErrorKind::StorageFull => "\nHINT: The destination filesystem is full.",
                _ => "",
            };
            anyhow!(
                "I/O error at '{}' while extracting '{}': {}{}",
                path.display(),
                archive.display(),
                source,
                hint
            )
        }
    }
}

/// Adds context to a generic error about archive operations
pub fn add_archive_context<T>(
    result: Result<T, ExtractionError>,
    archive: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_extraction_error(e, archive))
}

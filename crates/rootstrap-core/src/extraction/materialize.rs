//! Creation of filesystem objects from archive entries.

use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::ExtractionConfig;
use crate::ExtractionError;
use crate::ExtractionReport;
use crate::Result;
use crate::copy;
use crate::copy::CopyBuffer;
use crate::report::Degradation;
use crate::report::SkipReason;
use crate::security::SecurityGuard;
use crate::types::EntryKind;

use super::permissions::OWNER_RWX;
use super::permissions::PermissionApplier;
use super::permissions::PermissionOutcome;
use super::timestamps::TimestampApplier;

/// One way of producing a hard link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// A second name for the target inode.
    HardLink,
    /// An independent byte copy of the target.
    Copy,
    /// Always fails.
    #[cfg(test)]
    Unavailable,
}

impl LinkStrategy {
    fn link(self, target: &Path, path: &Path, buffer: &mut CopyBuffer) -> io::Result<u64> {
        match self {
            Self::HardLink => fs::hard_link(target, path).map(|()| 0),
            Self::Copy => copy::copy_file(target, path, buffer).inspect_err(|_| {
                let _ = fs::remove_file(path);
            }),
            #[cfg(test)]
            Self::Unavailable => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "strategy unavailable",
            )),
        }
    }
}

/// Header fields the materializer needs besides the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Mode bits from the header.
    pub mode: u32,
    /// Modification time in seconds since the epoch.
    pub mtime: u64,
    /// Declared content length.
    pub size: u64,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The object exists on disk; `bytes` of content were written.
    Created {
        /// Content bytes written (zero for directories and links).
        bytes: u64,
    },
    /// The entry was not materialized.
    Skipped(SkipReason),
}

#[derive(Debug)]
struct PendingDirectory {
    path: PathBuf,
    mode: u32,
    mtime: u64,
}

/// Type-dispatching creator of filesystem objects.
///
/// Paths handed to the materializer must already have been resolved by the
/// [`SecurityGuard`]. Hard-link targets are resolved here, through the same
/// guard.
///
/// Directory modes are applied with owner access forced on while the
/// extraction runs, so that read-only directories can still receive their
/// children. [`EntryMaterializer::finish`] applies the exact modes and
/// mtimes, deepest directories first.
pub struct EntryMaterializer<'g> {
    guard: &'g SecurityGuard,
    permissions: PermissionApplier,
    timestamps: TimestampApplier,
    link_strategies: Vec<LinkStrategy>,
    buffer: CopyBuffer,
    pending_dirs: Vec<PendingDirectory>,
}

impl<'g> EntryMaterializer<'g> {
    /// Creates a materializer for one extraction.
    #[must_use]
    pub fn new(guard: &'g SecurityGuard, config: &ExtractionConfig) -> Self {
        let permissions = if config.preserve_permissions {
            PermissionApplier::new(config.mode_strategies.clone()).with_mask(config.mode_mask)
        } else {
            PermissionApplier::disabled()
        };

        Self {
            guard,
            permissions,
            timestamps: TimestampApplier::new(config.preserve_mtime),
            link_strategies: config.link_strategies.clone(),
            buffer: CopyBuffer::new(),
            pending_dirs: Vec::new(),
        }
    }

    /// Creates the object described by `kind` at the resolved `path`.
    ///
    /// # Errors
    ///
    /// Returns `SymlinkUnsupported` if a symlink cannot be created,
    /// `MalformedArchive` if file content is shorter than declared, and `Io`
    /// for any other failure to create an object.
    pub fn materialize<R: Read + ?Sized>(
        &mut self,
        path: &Path,
        kind: &EntryKind,
        meta: EntryMeta,
        content: &mut R,
        report: &mut ExtractionReport,
    ) -> Result<EntryOutcome> {
        match kind {
            EntryKind::Directory => self.create_directory(path, meta, report),
            EntryKind::RegularFile => self.write_file(path, meta, content, report),
            EntryKind::SymbolicLink { target } => self.create_symlink(path, target, meta, report),
            EntryKind::HardLink { target } => self.create_hardlink(path, target, meta, report),
        }
    }

    fn create_directory(
        &mut self,
        path: &Path,
        meta: EntryMeta,
        report: &mut ExtractionReport,
    ) -> Result<EntryOutcome> {
        fs::create_dir_all(path).map_err(|e| ExtractionError::io(path, e))?;

        let _ = self.permissions.apply(path, meta.mode | OWNER_RWX);
        let _ = self.timestamps.apply(path, meta.mtime);
        self.pending_dirs.push(PendingDirectory {
            path: path.to_path_buf(),
            mode: meta.mode,
            mtime: meta.mtime,
        });

        report.directories_created += 1;
        Ok(EntryOutcome::Created { bytes: 0 })
    }

    fn write_file<R: Read + ?Sized>(
        &mut self,
        path: &Path,
        meta: EntryMeta,
        content: &mut R,
        report: &mut ExtractionReport,
    ) -> Result<EntryOutcome> {
        ensure_parent(path)?;
        if is_symlink(path) {
            fs::remove_file(path).map_err(|e| ExtractionError::io(path, e))?;
        }

        let file = match File::create(path) {
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && path.exists() => {
                debug!(path = %path.display(), "replacing read-only file");
                fs::remove_file(path).and_then(|()| File::create(path))
            }
            other => other,
        }
        .map_err(|e| ExtractionError::io(path, e))?;

        let written = copy::write_into(content, file, &mut self.buffer)
            .map_err(|e| ExtractionError::io(path, e))?;
        if written < meta.size {
            return Err(ExtractionError::malformed(format!(
                "truncated entry {}: expected {} bytes, got {written}",
                path.display(),
                meta.size
            )));
        }

        self.apply_mode(path, meta.mode, report);
        self.apply_mtime(path, meta.mtime, report);

        report.files_extracted += 1;
        report.bytes_written = report.bytes_written.saturating_add(written);
        Ok(EntryOutcome::Created { bytes: written })
    }

    fn create_symlink(
        &mut self,
        path: &Path,
        target: &Path,
        meta: EntryMeta,
        report: &mut ExtractionReport,
    ) -> Result<EntryOutcome> {
        ensure_parent(path)?;
        remove_existing(path)?;

        symlink(target, path).map_err(|source| ExtractionError::SymlinkUnsupported {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
            source,
        })?;

        if !self.timestamps.apply_to_symlink(path, meta.mtime) {
            report.add_degradation(Degradation::Timestamp {
                path: path.to_path_buf(),
            });
        }

        report.symlinks_created += 1;
        Ok(EntryOutcome::Created { bytes: 0 })
    }

    fn create_hardlink(
        &mut self,
        path: &Path,
        raw_target: &Path,
        meta: EntryMeta,
        report: &mut ExtractionReport,
    ) -> Result<EntryOutcome> {
        let target = match self.guard.resolve_link_target(raw_target) {
            Ok(target) => target,
            Err(violation) => {
                warn!(path = %path.display(), target = %raw_target.display(), %violation, "hard link target escapes destination");
                return Ok(EntryOutcome::Skipped(SkipReason::PathTraversal));
            }
        };
        if target == path {
            return Ok(EntryOutcome::Skipped(
                SkipReason::HardlinkTargetUnavailable { target },
            ));
        }

        ensure_parent(path)?;
        remove_existing(path)?;

        let mut linked = None;
        for strategy in &self.link_strategies {
            match strategy.link(&target, path, &mut self.buffer) {
                Ok(bytes) => {
                    linked = Some((*strategy, bytes));
                    break;
                }
                Err(e) => {
                    debug!(path = %path.display(), target = %target.display(), ?strategy, error = %e, "link strategy failed");
                }
            }
        }
        let Some((strategy, bytes)) = linked else {
            return Ok(EntryOutcome::Skipped(
                SkipReason::HardlinkTargetUnavailable { target },
            ));
        };

        if strategy == LinkStrategy::Copy {
            report.add_degradation(Degradation::HardlinkCopied {
                path: path.to_path_buf(),
            });
            report.bytes_written = report.bytes_written.saturating_add(bytes);
        }
        self.apply_mode(path, meta.mode, report);
        self.apply_mtime(path, meta.mtime, report);

        report.hardlinks_created += 1;
        Ok(EntryOutcome::Created { bytes })
    }

    /// Applies the exact mode and mtime of every directory created so far,
    /// children before parents.
    pub fn finish(&mut self, report: &mut ExtractionReport) {
        let pending = std::mem::take(&mut self.pending_dirs);
        for dir in pending.iter().rev() {
            self.apply_mode(&dir.path, dir.mode, report);
            self.apply_mtime(&dir.path, dir.mtime, report);
        }
    }

    fn apply_mode(&self, path: &Path, mode: u32, report: &mut ExtractionReport) {
        match self.permissions.apply(path, mode) {
            PermissionOutcome::Applied | PermissionOutcome::Disabled => {}
            PermissionOutcome::Degraded => {
                warn!(path = %path.display(), mode = format_args!("{mode:#o}"), "only owner permissions applied");
                report.add_degradation(Degradation::PermissionsDegraded {
                    path: path.to_path_buf(),
                    mode,
                });
            }
            PermissionOutcome::Failed => {
                warn!(path = %path.display(), mode = format_args!("{mode:#o}"), "failed to apply permissions");
                report.add_degradation(Degradation::PermissionsFailed {
                    path: path.to_path_buf(),
                    mode,
                });
            }
        }
    }

    fn apply_mtime(&self, path: &Path, mtime: u64, report: &mut ExtractionReport) {
        if !self.timestamps.apply(path, mtime) {
            report.add_degradation(Degradation::Timestamp {
                path: path.to_path_buf(),
            });
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| ExtractionError::io(parent, e)),
        None => Ok(()),
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Clears the way for a link: removes a file or symlink, or an empty
/// directory, at `path`.
fn remove_existing(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
    .map_err(|e| ExtractionError::io(path, e))
}

#[cfg(unix)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, path)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

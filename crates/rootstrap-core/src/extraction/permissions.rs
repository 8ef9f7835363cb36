//! Permission application with an ordered fallback chain.

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

/// Owner read, write and execute bits.
pub const OWNER_RWX: u32 = 0o700;

/// One way of applying header mode bits to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStrategy {
    /// Apply the masked mode, special bits included.
    Native,
    /// Apply only the owner read/write/execute bits, keeping the group,
    /// other and special bits already on the path.
    OwnerOnly,
    /// Always fails.
    #[cfg(test)]
    Unavailable,
}

impl ModeStrategy {
    /// Applies `mode` to `path` with this strategy.
    ///
    /// # Errors
    ///
    /// Returns the I/O error of the underlying primitive.
    pub fn apply(self, path: &Path, mode: u32) -> io::Result<()> {
        match self {
            Self::Native => set_native(path, mode),
            Self::OwnerOnly => set_owner_only(path, mode & OWNER_RWX),
            #[cfg(test)]
            Self::Unavailable => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "strategy unavailable",
            )),
        }
    }
}

#[cfg(unix)]
fn set_native(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_native(_path: &Path, _mode: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "POSIX modes are not supported on this platform",
    ))
}

#[cfg(unix)]
fn set_owner_only(path: &Path, owner_bits: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let current = fs::metadata(path)?.permissions().mode() & 0o7777;
    let mode = (current & !OWNER_RWX) | owner_bits;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_owner_only(path: &Path, owner_bits: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(owner_bits & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

/// Result of applying a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// The first strategy of the chain succeeded.
    Applied,
    /// A later strategy succeeded.
    Degraded,
    /// Every strategy failed.
    Failed,
    /// Permission application is disabled.
    Disabled,
}

/// Applies header modes through a [`ModeStrategy`] chain.
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::extraction::ModeStrategy;
/// use rootstrap_core::extraction::PermissionApplier;
/// use rootstrap_core::extraction::PermissionOutcome;
/// use std::path::Path;
///
/// let applier = PermissionApplier::new(vec![ModeStrategy::Native, ModeStrategy::OwnerOnly]);
/// let outcome = applier.apply(Path::new("/tmp/rootfs/bin/busybox"), 0o755);
/// assert_ne!(outcome, PermissionOutcome::Failed);
/// ```
#[derive(Debug, Clone)]
pub struct PermissionApplier {
    strategies: Vec<ModeStrategy>,
    mask: u32,
    enabled: bool,
}

impl PermissionApplier {
    /// Creates an applier with the full `0o7777` mask.
    #[must_use]
    pub fn new(strategies: Vec<ModeStrategy>) -> Self {
        Self {
            strategies,
            mask: 0o7777,
            enabled: true,
        }
    }

    /// Creates an applier that does nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            strategies: Vec::new(),
            mask: 0,
            enabled: false,
        }
    }

    /// Restricts which header bits are applied.
    #[must_use]
    pub fn with_mask(mut self, mask: u32) -> Self {
        self.mask = mask & 0o7777;
        self
    }

    /// Applies `mode` to `path`, trying each strategy in order.
    pub fn apply(&self, path: &Path, mode: u32) -> PermissionOutcome {
        if !self.enabled {
            return PermissionOutcome::Disabled;
        }

        let mode = mode & self.mask;
        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.apply(path, mode) {
                Ok(()) if index == 0 => return PermissionOutcome::Applied,
                Ok(()) => return PermissionOutcome::Degraded,
                Err(e) => {
                    debug!(path = %path.display(), ?strategy, mode = format_args!("{mode:#o}"), error = %e, "mode strategy failed");
                }
            }
        }
        PermissionOutcome::Failed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    #[cfg(unix)]
    fn test_native_applies_full_mode() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("script.sh");
        fs::write(&path, "#!/bin/sh").unwrap();

        let applier = PermissionApplier::new(vec![ModeStrategy::Native, ModeStrategy::OwnerOnly]);
        assert_eq!(applier.apply(&path, 0o754), PermissionOutcome::Applied);
        assert_eq!(mode_of(&path), 0o754);
    }

    #[cfg(unix)]
    fn file_with_mode(temp: &TempDir, mode: u32) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = temp.path().join("file");
        fs::write(&path, "x").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    #[cfg(unix)]
    fn test_owner_only_touches_only_owner_bits() {
        let temp = TempDir::new().unwrap();
        let path = file_with_mode(&temp, 0o640);

        assert_eq!(
            PermissionApplier::new(vec![ModeStrategy::OwnerOnly]).apply(&path, 0o4755),
            PermissionOutcome::Applied
        );
        assert_eq!(mode_of(&path), 0o740);

        ModeStrategy::OwnerOnly.apply(&path, 0o444).unwrap();
        assert_eq!(mode_of(&path), 0o440);
    }

    #[test]
    #[cfg(unix)]
    fn test_fallback_to_owner_only_is_degraded() {
        let temp = TempDir::new().unwrap();
        let path = file_with_mode(&temp, 0o604);

        let applier =
            PermissionApplier::new(vec![ModeStrategy::Unavailable, ModeStrategy::OwnerOnly]);
        assert_eq!(applier.apply(&path, 0o751), PermissionOutcome::Degraded);
        assert_eq!(mode_of(&path), 0o704);
    }

    #[test]
    fn test_first_success_stops_the_chain() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x").unwrap();

        let applier =
            PermissionApplier::new(vec![ModeStrategy::OwnerOnly, ModeStrategy::Unavailable]);
        assert_eq!(applier.apply(&path, 0o755), PermissionOutcome::Applied);
        assert_eq!(
            PermissionApplier::new(vec![ModeStrategy::Unavailable]).apply(&path, 0o755),
            PermissionOutcome::Failed
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_mask_strips_bits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x").unwrap();

        let applier = PermissionApplier::new(vec![ModeStrategy::Native]).with_mask(0o777);
        applier.apply(&path, 0o100_4644);
        assert_eq!(mode_of(&path), 0o644);
    }

    #[test]
    fn test_all_strategies_failing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");

        let applier = PermissionApplier::new(vec![ModeStrategy::Native, ModeStrategy::OwnerOnly]);
        assert_eq!(applier.apply(&missing, 0o644), PermissionOutcome::Failed);
        assert_eq!(
            PermissionApplier::new(Vec::new()).apply(&missing, 0o644),
            PermissionOutcome::Failed
        );
    }

    #[test]
    fn test_disabled_touches_nothing() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert_eq!(
            PermissionApplier::disabled().apply(&missing, 0o644),
            PermissionOutcome::Disabled
        );
    }
}

//! On-disk layout of an installed root filesystem.
//!
//! A root filesystem is usable once the [`READY_MARKER`] file exists at its
//! top. The marker is written last during installation and removed first
//! during removal, so an interrupted run never looks installed.

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use rootstrap_core::DestinationRoot;
use rootstrap_core::ExtractionReport;
use rootstrap_core::security::SecurityGuard;
use serde::Serialize;
use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the file that marks a finished installation.
pub const READY_MARKER: &str = ".ready";

const RESOLV_CONF: &str = "etc/resolv.conf";

/// Shipped by images built where `etc/resolv.conf` is not writable.
const RESOLV_CONF_OVERRIDE: &str = "etc/resolv.conf.override";

/// What happened to `etc/resolv.conf.override` after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvConf {
    /// The archive did not ship an override.
    NotPresent,
    /// The override replaced `etc/resolv.conf` and was deleted.
    Applied,
    /// The override could not be applied and was left in place.
    Kept,
}

/// Snapshot for `rootstrap status`.
#[derive(Debug, Serialize)]
pub struct RootfsStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub ready: bool,
}

/// Result of `rootstrap install`.
#[derive(Debug)]
pub struct InstallSummary<'a> {
    pub rootfs_dir: &'a Path,
    pub report: &'a ExtractionReport,
    pub resolv_conf: ResolvConf,
    pub reinstalled: bool,
}

/// A root filesystem directory.
#[derive(Debug, Clone)]
pub struct Rootfs {
    dir: PathBuf,
}

impl Rootfs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ready_marker(&self) -> PathBuf {
        self.dir.join(READY_MARKER)
    }

    /// A symlink named like the marker does not count.
    pub fn is_ready(&self) -> bool {
        fs::symlink_metadata(self.ready_marker()).is_ok_and(|meta| meta.is_file())
    }

    pub fn status(&self) -> RootfsStatus {
        RootfsStatus {
            path: self.dir.clone(),
            exists: self.dir.is_dir(),
            ready: self.is_ready(),
        }
    }

    /// Creates the ready marker, replacing any non-file object at its path.
    pub fn mark_ready(&self) -> io::Result<()> {
        let marker = self.ready_marker();
        if fs::symlink_metadata(&marker).is_ok_and(|meta| !meta.is_file()) {
            remove_any(&marker)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&marker)
            .map(drop)
    }

    pub fn clear_ready(&self) -> io::Result<()> {
        match fs::remove_file(self.ready_marker()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Copies `etc/resolv.conf.override` over `etc/resolv.conf` and deletes
    /// the override.
    ///
    /// Both paths come from an untrusted archive, so they are resolved
    /// through the same guard the extractor uses. An override that is not a
    /// regular file is rejected, and an existing `etc/resolv.conf` is
    /// unlinked rather than written through.
    pub fn apply_resolv_conf_override(&self) -> Result<ResolvConf> {
        let root = DestinationRoot::ensure(&self.dir)
            .with_context(|| format!("cannot open root filesystem '{}'", self.dir.display()))?;
        let guard = SecurityGuard::new(root);

        let source = guard.resolve(Path::new(RESOLV_CONF_OVERRIDE), false)?;
        match fs::symlink_metadata(&source) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => bail!("'{}' is not a regular file", source.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ResolvConf::NotPresent),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot inspect '{}'", source.display()));
            }
        }

        let target = guard.resolve(Path::new(RESOLV_CONF), false)?;
        remove_any(&target).with_context(|| format!("cannot replace '{}'", target.display()))?;
        fs::copy(&source, &target).with_context(|| {
            format!(
                "cannot copy '{}' to '{}'",
                source.display(),
                target.display()
            )
        })?;
        fs::remove_file(&source)
            .with_context(|| format!("cannot delete '{}'", source.display()))?;

        debug!(path = %target.display(), "applied resolv.conf override");
        Ok(ResolvConf::Applied)
    }

    /// Deletes the whole tree. Returns `false` if there was nothing to remove.
    pub fn remove(&self) -> Result<bool> {
        let meta = match fs::symlink_metadata(&self.dir) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot inspect '{}'", self.dir.display()));
            }
        };
        if !meta.is_dir() {
            bail!("'{}' is not a directory", self.dir.display());
        }
        let canonical = fs::canonicalize(&self.dir)
            .with_context(|| format!("cannot resolve '{}'", self.dir.display()))?;
        if canonical.parent().is_none() {
            bail!("refusing to remove '{}'", canonical.display());
        }

        self.clear_ready()
            .with_context(|| format!("cannot remove '{}'", self.ready_marker().display()))?;

        // Images can contain directories without the owner write bit.
        loop {
            match fs::remove_dir_all(&self.dir) {
                Ok(()) => return Ok(true),
                Err(e)
                    if e.kind() == io::ErrorKind::PermissionDenied
                        && make_tree_writable(&self.dir) > 0 =>
                {
                    debug!(path = %self.dir.display(), "retrying removal after fixing permissions");
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("cannot remove '{}'", self.dir.display()));
                }
            }
        }
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Returns how many directories were changed.
fn make_tree_writable(dir: &Path) -> usize {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| make_owner_writable(entry.path()).unwrap_or(false))
        .count()
}

#[cfg(unix)]
fn make_owner_writable(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::symlink_metadata(path)?.permissions().mode();
    if mode & 0o700 == 0o700 {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o700))?;
    Ok(true)
}

#[cfg(not(unix))]
fn make_owner_writable(path: &Path) -> io::Result<bool> {
    let mut permissions = fs::symlink_metadata(path)?.permissions();
    if !permissions.readonly() {
        return Ok(false);
    }
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rootfs_in(temp: &TempDir) -> Rootfs {
        let dir = temp.path().join("rootfs");
        fs::create_dir_all(dir.join("etc")).unwrap();
        Rootfs::new(dir)
    }

    #[test]
    fn test_ready_marker_lifecycle() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);

        assert!(!rootfs.is_ready());
        rootfs.mark_ready().unwrap();
        assert!(rootfs.is_ready());
        assert!(rootfs.dir().join(".ready").is_file());

        rootfs.clear_ready().unwrap();
        assert!(!rootfs.is_ready());
        rootfs.clear_ready().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinked_marker_is_not_ready_and_gets_replaced() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        let outside = temp.path().join("outside");
        fs::write(&outside, "keep").unwrap();
        std::os::unix::fs::symlink(&outside, rootfs.ready_marker()).unwrap();

        assert!(!rootfs.is_ready());
        rootfs.mark_ready().unwrap();

        assert!(rootfs.is_ready());
        assert_eq!(fs::read_to_string(&outside).unwrap(), "keep");
    }

    #[test]
    fn test_status_of_missing_directory() {
        let temp = TempDir::new().unwrap();
        let status = Rootfs::new(temp.path().join("absent")).status();
        assert!(!status.exists);
        assert!(!status.ready);
    }

    #[test]
    fn test_override_absent() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        fs::write(rootfs.dir().join("etc/resolv.conf"), "nameserver 10.0.0.1\n").unwrap();

        assert_eq!(rootfs.apply_resolv_conf_override().unwrap(), ResolvConf::NotPresent);
        assert_eq!(
            fs::read_to_string(rootfs.dir().join("etc/resolv.conf")).unwrap(),
            "nameserver 10.0.0.1\n"
        );
    }

    #[test]
    fn test_override_replaces_resolv_conf() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        let etc = rootfs.dir().join("etc");
        fs::write(etc.join("resolv.conf"), "nameserver 127.0.0.11\n").unwrap();
        fs::write(etc.join("resolv.conf.override"), "nameserver 8.8.8.8\n").unwrap();

        assert_eq!(rootfs.apply_resolv_conf_override().unwrap(), ResolvConf::Applied);
        assert_eq!(
            fs::read_to_string(etc.join("resolv.conf")).unwrap(),
            "nameserver 8.8.8.8\n"
        );
        assert!(!etc.join("resolv.conf.override").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_override_does_not_write_through_resolv_conf_symlink() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        let etc = rootfs.dir().join("etc");
        let victim = temp.path().join("host-resolv.conf");
        fs::write(&victim, "host").unwrap();
        std::os::unix::fs::symlink(&victim, etc.join("resolv.conf")).unwrap();
        fs::write(etc.join("resolv.conf.override"), "nameserver 1.1.1.1\n").unwrap();

        rootfs.apply_resolv_conf_override().unwrap();

        assert_eq!(fs::read_to_string(&victim).unwrap(), "host");
        assert!(!fs::symlink_metadata(etc.join("resolv.conf")).unwrap().file_type().is_symlink());
    }

    #[test]
    #[cfg(unix)]
    fn test_override_symlink_is_rejected() {
        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        let secret = temp.path().join("secret");
        fs::write(&secret, "token").unwrap();
        std::os::unix::fs::symlink(&secret, rootfs.dir().join("etc/resolv.conf.override")).unwrap();

        assert!(rootfs.apply_resolv_conf_override().is_err());
        assert!(!rootfs.dir().join("etc/resolv.conf").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_escaping_etc_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("rootfs");
        let host_etc = temp.path().join("host-etc");
        fs::create_dir_all(&dir).unwrap();
        fs::create_dir_all(&host_etc).unwrap();
        fs::write(host_etc.join("resolv.conf.override"), "x").unwrap();
        std::os::unix::fs::symlink(&host_etc, dir.join("etc")).unwrap();

        assert!(Rootfs::new(&dir).apply_resolv_conf_override().is_err());
        assert!(host_etc.join("resolv.conf.override").exists());
        assert!(!host_etc.join("resolv.conf").exists());
    }

    #[test]
    fn test_remove_missing_directory() {
        let temp = TempDir::new().unwrap();
        assert!(!Rootfs::new(temp.path().join("absent")).remove().unwrap());
    }

    #[test]
    fn test_remove_rejects_regular_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(Rootfs::new(&file).remove().is_err());
        assert!(file.exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_remove_read_only_tree() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let rootfs = rootfs_in(&temp);
        let locked = rootfs.dir().join("usr/share");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("file"), "x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        rootfs.mark_ready().unwrap();

        assert!(rootfs.remove().unwrap());
        assert!(!rootfs.dir().exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_make_tree_writable_counts_changes() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tree");
        fs::create_dir_all(dir.join("a")).unwrap();
        fs::set_permissions(dir.join("a"), fs::Permissions::from_mode(0o500)).unwrap();

        assert_eq!(make_tree_writable(&dir), 1);
        assert_eq!(make_tree_writable(&dir), 0);
    }
}

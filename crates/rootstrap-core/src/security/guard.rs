//! Path containment checks for archive entries.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::DestinationRoot;
use crate::types::EntryKind;

/// Why an entry name was refused.
#[derive(Error, Debug)]
pub enum Violation {
    /// The name is absolute.
    #[error("absolute path: {name}")]
    AbsolutePath {
        /// The offending name.
        name: PathBuf,
    },

    /// The name contains a NUL byte.
    #[error("path contains a NUL byte")]
    NulByte,

    /// A non-directory entry has no final file name (`.`, `a/..`, empty).
    #[error("entry name has no file name: {name}")]
    NoFileName {
        /// The offending name.
        name: PathBuf,
    },

    /// The resolved path lies outside the destination root.
    #[error("resolves outside destination: {resolved}")]
    Escapes {
        /// Where the name resolved to.
        resolved: PathBuf,
    },

    /// The path could not be resolved (symlink loop, permission denied).
    #[error("cannot resolve path: {source}")]
    Unresolvable {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Resolves untrusted entry names against a destination root.
///
/// Resolution follows symlinks that already exist on disk, including ones
/// created by earlier entries of the same archive, so a link pointing outside
/// the root cannot be used as a stepping stone.
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::security::SecurityGuard;
/// use rootstrap_core::types::DestinationRoot;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = SecurityGuard::new(DestinationRoot::ensure("/tmp/rootfs")?);
/// assert!(guard.resolve(Path::new("etc/hosts"), false).is_ok());
/// assert!(guard.resolve(Path::new("../../etc/passwd"), false).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SecurityGuard {
    root: DestinationRoot,
}

impl SecurityGuard {
    /// Creates a guard for `root`.
    #[must_use]
    pub const fn new(root: DestinationRoot) -> Self {
        Self { root }
    }

    /// The destination root this guard protects.
    #[must_use]
    pub const fn root(&self) -> &DestinationRoot {
        &self.root
    }

    /// Resolves the path an entry of `kind` named `name` would be created at.
    ///
    /// Directories follow their final component since later entries are
    /// created beneath them. Other kinds replace whatever sits at their final
    /// component, so only the parent is resolved.
    pub fn resolve_entry(&self, name: &Path, kind: &EntryKind) -> Result<PathBuf, Violation> {
        self.resolve(name, kind.is_directory())
    }

    /// Resolves the existing object a hard link names.
    pub fn resolve_link_target(&self, target: &Path) -> Result<PathBuf, Violation> {
        self.resolve(target, true)
    }

    /// Resolves `name` under the root and checks containment.
    ///
    /// # Errors
    ///
    /// Returns a [`Violation`] if the name is absolute, contains NUL, cannot
    /// be resolved, or resolves outside the root.
    pub fn resolve(&self, name: &Path, follow_final: bool) -> Result<PathBuf, Violation> {
        check_name(name)?;

        let resolved = if follow_final {
            resolve_beneath(self.root.as_path(), name, true)
        } else {
            let file_name = final_name(name).ok_or_else(|| Violation::NoFileName {
                name: name.to_path_buf(),
            })?;
            let parent = name.parent().unwrap_or_else(|| Path::new(""));
            resolve_beneath(self.root.as_path(), parent, false).map(|p| p.join(file_name))
        }
        .map_err(|source| Violation::Unresolvable { source })?;

        if self.root.contains(&resolved) {
            Ok(resolved)
        } else {
            Err(Violation::Escapes { resolved })
        }
    }
}

fn check_name(name: &Path) -> Result<(), Violation> {
    if name.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Violation::NulByte);
    }
    if name.has_root()
        || name
            .components()
            .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
    {
        return Err(Violation::AbsolutePath {
            name: name.to_path_buf(),
        });
    }
    Ok(())
}

fn final_name(name: &Path) -> Option<&OsStr> {
    match name.components().next_back()? {
        Component::Normal(n) => Some(n),
        _ => None,
    }
}

/// Resolves `relative` beneath the canonical directory `base`, one
/// component at a time.
///
/// Symlinks that exist on disk are followed as the kernel would follow them.
/// Once a component is missing or not a directory, the rest is appended as
/// is, and a `..` past that point is refused: the kernel could not walk it,
/// and popping it lexically would skip whatever the earlier components
/// really are. A dangling symlink is accepted only as the final component,
/// and only when `final_may_dangle` is set.
pub(crate) fn resolve_beneath(
    base: &Path,
    relative: &Path,
    final_may_dangle: bool,
) -> io::Result<PathBuf> {
    let mut resolved = base.to_path_buf();
    let mut walkable = true;
    let mut components = relative.components().peekable();

    while let Some(component) = components.next() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if walkable => {
                resolved.pop();
            }
            Component::ParentDir => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("`..` below a missing component: {}", resolved.display()),
                ));
            }
            Component::Normal(part) => {
                resolved.push(part);
                if walkable {
                    let may_dangle = final_may_dangle && components.peek().is_none();
                    walkable = step(&mut resolved, may_dangle)?;
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a relative path: {}", relative.display()),
                ));
            }
        }
    }

    Ok(resolved)
}

/// Resolves the last component of `path` in place and reports whether the
/// result is a directory that can be walked into.
fn step(path: &mut PathBuf, may_dangle: bool) -> io::Result<bool> {
    let meta = match fs::symlink_metadata(&*path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !meta.file_type().is_symlink() {
        return Ok(meta.is_dir());
    }

    match path.canonicalize() {
        Ok(target) => {
            let is_dir = target.is_dir();
            *path = target;
            Ok(is_dir)
        }
        // A dangling link in final position can still be replaced.
        Err(e) if e.kind() == io::ErrorKind::NotFound && may_dangle => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn guard() -> (TempDir, SecurityGuard) {
        let temp = TempDir::new().expect("failed to create temp dir");
        let root = DestinationRoot::ensure(temp.path().join("dest")).unwrap();
        (temp, SecurityGuard::new(root))
    }

    #[test]
    fn test_plain_names_are_contained() {
        let (_temp, guard) = guard();
        let resolved = guard.resolve(Path::new("usr/bin/env"), false).unwrap();
        assert_eq!(resolved, guard.root().join("usr/bin/env"));

        let resolved = guard.resolve(Path::new("./etc/./hosts"), false).unwrap();
        assert_eq!(resolved, guard.root().join("etc/hosts"));
    }

    #[test]
    fn test_inner_parent_dir_stays_inside() {
        let (_temp, guard) = guard();
        fs::create_dir_all(guard.root().join("a/b")).unwrap();
        let resolved = guard.resolve(Path::new("a/b/../c.txt"), false).unwrap();
        assert_eq!(resolved, guard.root().join("a/c.txt"));
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_temp, guard) = guard();
        for name in ["../../etc/passwd", ".."] {
            let follow = name == "..";
            let err = guard.resolve(Path::new(name), follow).unwrap_err();
            assert!(matches!(err, Violation::Escapes { .. }), "{name}: {err:?}");
        }
        for name in ["a/../../b", "a/../../../../../../tmp/x"] {
            assert!(guard.resolve(Path::new(name), false).is_err(), "{name}");
        }
    }

    #[test]
    fn test_parent_dir_after_missing_component_is_rejected() {
        let (_temp, guard) = guard();
        for name in ["missing/../x", "missing/deeper/../../x", "a/b/../c.txt"] {
            let err = guard.resolve(Path::new(name), false).unwrap_err();
            assert!(matches!(err, Violation::Unresolvable { .. }), "{name}: {err:?}");
            let err = guard.resolve(Path::new(name), true).unwrap_err();
            assert!(matches!(err, Violation::Unresolvable { .. }), "{name}: {err:?}");
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_missing_component_cannot_hide_escaping_symlink() {
        let (temp, guard) = guard();
        let outside = temp.path().join("outside");
        fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, guard.root().join("link")).unwrap();
        std::os::unix::fs::symlink("..", guard.root().join("up")).unwrap();

        for name in ["missing/../link/pwned", "nope/../up/pwned"] {
            assert!(guard.resolve(Path::new(name), false).is_err(), "{name}");
            assert!(guard.resolve(Path::new(name), true).is_err(), "{name}");
            assert!(guard.resolve_link_target(Path::new(name)).is_err(), "{name}");
        }
    }

    #[test]
    fn test_parent_dir_after_file_is_rejected() {
        let (_temp, guard) = guard();
        fs::write(guard.root().join("file"), "x").unwrap();
        let err = guard
            .resolve(Path::new("file/../other"), false)
            .unwrap_err();
        assert!(matches!(err, Violation::Unresolvable { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_dangling_symlink_is_only_replaceable() {
        let (temp, guard) = guard();
        std::os::unix::fs::symlink(temp.path().join("gone"), guard.root().join("dangling"))
            .unwrap();

        let resolved = guard
            .resolve_entry(Path::new("dangling"), &EntryKind::Directory)
            .unwrap();
        assert_eq!(resolved, guard.root().join("dangling"));
        assert!(guard.resolve(Path::new("dangling/child"), false).is_err());
    }

    #[test]
    fn test_sibling_prefix_is_not_contained() {
        let (_temp, guard) = guard();
        let err = guard
            .resolve(Path::new("../dest-other/file"), false)
            .unwrap_err();
        assert!(matches!(err, Violation::Escapes { .. }));
    }

    #[test]
    fn test_absolute_and_nul_names_are_rejected() {
        let (_temp, guard) = guard();
        assert!(matches!(
            guard.resolve(Path::new("/etc/passwd"), false),
            Err(Violation::AbsolutePath { .. })
        ));

        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            let name = Path::new(OsStr::from_bytes(b"a\0b"));
            assert!(matches!(guard.resolve(name, false), Err(Violation::NulByte)));
        }
    }

    #[test]
    fn test_root_itself_is_contained_for_directories() {
        let (_temp, guard) = guard();
        let resolved = guard.resolve_entry(Path::new("./"), &EntryKind::Directory);
        assert_eq!(resolved.unwrap(), guard.root().as_path());

        let err = guard
            .resolve_entry(Path::new("."), &EntryKind::RegularFile)
            .unwrap_err();
        assert!(matches!(err, Violation::NoFileName { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_pointing_outside_cannot_be_traversed() {
        let (temp, guard) = guard();
        let outside = temp.path().join("outside");
        fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, guard.root().join("escape")).unwrap();

        let err = guard
            .resolve(Path::new("escape/payload"), false)
            .unwrap_err();
        assert!(matches!(err, Violation::Escapes { .. }));

        let err = guard
            .resolve_entry(Path::new("escape"), &EntryKind::Directory)
            .unwrap_err();
        assert!(matches!(err, Violation::Escapes { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_final_symlink_is_not_followed_for_files() {
        let (temp, guard) = guard();
        let outside = temp.path().join("secret");
        fs::write(&outside, "x").unwrap();
        std::os::unix::fs::symlink(&outside, guard.root().join("link")).unwrap();

        let resolved = guard
            .resolve_entry(
                Path::new("link"),
                &EntryKind::SymbolicLink {
                    target: PathBuf::from("anything"),
                },
            )
            .unwrap();
        assert_eq!(resolved, guard.root().join("link"));

        assert!(guard.resolve_link_target(Path::new("link")).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_inner_symlink_is_followed() {
        let (_temp, guard) = guard();
        fs::create_dir_all(guard.root().join("usr/lib")).unwrap();
        std::os::unix::fs::symlink("usr/lib", guard.root().join("lib")).unwrap();

        let resolved = guard.resolve(Path::new("lib/libc.so"), false).unwrap();
        assert_eq!(resolved, guard.root().join("usr/lib/libc.so"));
    }

    #[test]
    fn test_resolve_beneath_missing_tail() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();
        fs::create_dir(base.join("x")).unwrap();
        let resolved = resolve_beneath(&base, Path::new("x/../missing/./y"), false).unwrap();
        assert_eq!(resolved, base.join("missing/y"));
    }

    #[test]
    fn test_resolve_beneath_through_file() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().canonicalize().unwrap();
        fs::write(base.join("file"), "x").unwrap();
        let resolved = resolve_beneath(&base, Path::new("file/child"), false).unwrap();
        assert_eq!(resolved, base.join("file/child"));
    }

    #[test]
    fn test_resolution_creates_nothing() {
        let (_temp, guard) = guard();
        let _ = guard.resolve(Path::new("a/b/c/d.txt"), false).unwrap();
        assert!(!guard.root().join("a").exists());
    }
}

//! Destination root of an extraction.

use std::io;
use std::path::Path;
use std::path::PathBuf;

/// The directory that bounds every object an extraction creates.
///
/// A `DestinationRoot` is always an existing directory held as an absolute,
/// canonical path, so containment checks are plain prefix comparisons.
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::types::DestinationRoot;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = DestinationRoot::ensure("/tmp/rootfs")?;
/// assert!(root.contains(&root.as_path().join("usr/bin")));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRoot(PathBuf);

impl DestinationRoot {
    /// Creates the directory (and its parents) if absent, then canonicalizes.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, if the path exists
    /// but is not a directory, or if it cannot be canonicalized.
    pub fn ensure(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let canonical = path.canonicalize()?;
        if !canonical.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("path is not a directory: {}", path.display()),
            ));
        }

        Ok(Self(canonical))
    }

    /// Returns the canonical path.
    #[inline]
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Joins an archive-relative path onto the root, without validation.
    #[inline]
    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.0.join(relative)
    }

    /// Returns `true` if `canonical` is the root itself or lies beneath it.
    ///
    /// The comparison is component-wise, so `/dest-other` is not inside
    /// `/dest`.
    #[inline]
    #[must_use]
    pub fn contains(&self, canonical: &Path) -> bool {
        canonical.starts_with(&self.0)
    }

    /// Converts into the inner `PathBuf`.
    #[inline]
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

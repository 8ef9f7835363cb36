//! Archive entry kinds.

use std::path::Path;
use std::path::PathBuf;

/// Kind of a materializable archive entry.
///
/// Link targets are kept exactly as stored in the archive. They have NOT been
/// validated or canonicalized.
///
/// # Examples
///
/// ```
/// use rootstrap_core::types::EntryKind;
/// use std::path::PathBuf;
///
/// let link = EntryKind::SymbolicLink {
///     target: PathBuf::from("../lib/libc.so"),
/// };
/// assert!(link.is_symlink());
/// assert_eq!(link.link_target(), Some(PathBuf::from("../lib/libc.so").as_path()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Directory entry.
    Directory,

    /// Regular file entry with content.
    RegularFile,

    /// Symbolic link entry.
    SymbolicLink {
        /// Raw link text.
        target: PathBuf,
    },

    /// Hard link entry, naming an earlier entry of the archive.
    HardLink {
        /// Raw target name, relative to the destination root.
        target: PathBuf,
    },
}

impl EntryKind {
    /// Maps a tar type flag to an entry kind.
    ///
    /// Returns `None` for types that are not materialized (devices, FIFOs,
    /// global pax headers, ...). Link kinds without a link name are also
    /// `None`.
    #[must_use]
    pub fn from_tar(entry_type: tar::EntryType, link_name: Option<&Path>) -> Option<Self> {
        if entry_type.is_dir() {
            return Some(Self::Directory);
        }
        if entry_type.is_file() || entry_type.is_contiguous() || entry_type.is_gnu_sparse() {
            return Some(Self::RegularFile);
        }
        if entry_type.is_symlink() {
            return link_name.map(|target| Self::SymbolicLink {
                target: target.to_path_buf(),
            });
        }
        if entry_type.is_hard_link() {
            return link_name.map(|target| Self::HardLink {
                target: target.to_path_buf(),
            });
        }
        None
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::RegularFile)
    }

    /// Returns `true` if this is a symlink.
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self, Self::SymbolicLink { .. })
    }

    /// Returns `true` if this is a hard link.
    #[must_use]
    pub const fn is_hardlink(&self) -> bool {
        matches!(self, Self::HardLink { .. })
    }

    /// Returns the raw link target for link kinds.
    #[must_use]
    pub fn link_target(&self) -> Option<&Path> {
        match self {
            Self::SymbolicLink { target } | Self::HardLink { target } => Some(target),
            Self::Directory | Self::RegularFile => None,
        }
    }
}

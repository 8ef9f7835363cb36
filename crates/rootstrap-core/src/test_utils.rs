//! Test utilities for building tar.xz archives in memory.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io::Write;

use xz2::write::XzEncoder;

/// Modification time given to entries that do not specify one.
pub const DEFAULT_MTIME: u64 = 1_600_000_000;

/// Compresses `data` into a single xz stream.
///
/// # Examples
///
/// ```
/// use rootstrap_core::test_utils::compress_xz;
///
/// let xz = compress_xz(b"hello");
/// assert_eq!(&xz[..6], b"\xFD7zXZ\0");
/// ```
#[must_use]
pub fn compress_xz(data: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Creates an uncompressed in-memory TAR archive of regular files.
///
/// Each entry is a tuple of (path, content). Files are created with mode 0o644.
#[must_use]
pub fn create_test_tar(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    let mut builder = TarXzBuilder::new();
    for (path, data) in entries {
        builder = builder.add_file(path, data);
    }
    builder.build_tar()
}

/// Creates an in-memory tar.xz archive of regular files.
///
/// # Examples
///
/// ```
/// use rootstrap_core::test_utils::create_test_tar_xz;
///
/// let data = create_test_tar_xz(vec![("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// assert!(!data.is_empty());
/// ```
#[must_use]
pub fn create_test_tar_xz(entries: Vec<(&str, &[u8])>) -> Vec<u8> {
    compress_xz(&create_test_tar(entries))
}

/// Builder for tar.xz test archives with every entry kind.
///
/// # Examples
///
/// ```
/// use rootstrap_core::test_utils::TarXzBuilder;
///
/// let data = TarXzBuilder::new()
///     .add_directory("a/")
///     .add_file("a/b.txt", b"hi")
///     .add_symlink("link", "a/b.txt")
///     .build();
/// ```
pub struct TarXzBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl TarXzBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    /// Adds a regular file with mode 0o644.
    #[must_use]
    pub fn add_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file_with_meta(path, data, 0o644, DEFAULT_MTIME)
    }

    /// Adds a regular file with an explicit mode and mtime.
    #[must_use]
    pub fn add_file_with_meta(mut self, path: &str, data: &[u8], mode: u32, mtime: u64) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_mtime(mtime);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        self.builder.append_data(&mut header, path, data).unwrap();
        self
    }

    /// Adds a directory with mode 0o755.
    #[must_use]
    pub fn add_directory(self, path: &str) -> Self {
        self.add_directory_with_meta(path, 0o755, DEFAULT_MTIME)
    }

    /// Adds a directory with an explicit mode and mtime.
    #[must_use]
    pub fn add_directory_with_meta(mut self, path: &str, mode: u32, mtime: u64) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(mode);
        header.set_mtime(mtime);
        header.set_entry_type(tar::EntryType::Directory);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a symlink. The target is stored verbatim.
    #[must_use]
    pub fn add_symlink(self, path: &str, target: &str) -> Self {
        self.add_link(path, target, tar::EntryType::Symlink, 0o777)
    }

    /// Adds a hard link to an earlier entry.
    #[must_use]
    pub fn add_hardlink(self, path: &str, target: &str) -> Self {
        self.add_link(path, target, tar::EntryType::Link, 0o644)
    }

    fn add_link(mut self, path: &str, target: &str, kind: tar::EntryType, mode: u32) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(mode);
        header.set_mtime(DEFAULT_MTIME);
        header.set_entry_type(kind);
        header.set_link_name(target).unwrap();
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds a FIFO entry, a kind that is never materialized.
    #[must_use]
    pub fn add_fifo(mut self, path: &str) -> Self {
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Fifo);
        header.set_cksum();
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    /// Adds an entry whose name bypasses the tar crate's path sanitization,
    /// e.g. `../../etc/passwd` or `/etc/passwd`.
    #[must_use]
    pub fn add_raw_entry(
        mut self,
        name: &str,
        kind: tar::EntryType,
        link_target: Option<&str>,
        data: &[u8],
    ) -> Self {
        let mut header = tar::Header::new_gnu();
        for (dst, src) in header
            .as_old_mut()
            .name
            .iter_mut()
            .zip(name.as_bytes().iter().chain(Some(&0)))
        {
            *dst = *src;
        }
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(DEFAULT_MTIME);
        header.set_entry_type(kind);
        if let Some(target) = link_target {
            header.set_link_name(target).unwrap();
        }
        header.set_cksum();
        self.builder.append(&header, data).unwrap();
        self
    }

    /// Adds a regular file with a raw, unsanitized name.
    #[must_use]
    pub fn add_raw_file(self, name: &str, data: &[u8]) -> Self {
        self.add_raw_entry(name, tar::EntryType::Regular, None, data)
    }

    /// Finishes and returns the uncompressed tar bytes.
    #[must_use]
    pub fn build_tar(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    /// Finishes and returns the xz-compressed tar bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        compress_xz(&self.build_tar())
    }
}

impl Default for TarXzBuilder {
    fn default() -> Self {
        Self::new()
    }
}

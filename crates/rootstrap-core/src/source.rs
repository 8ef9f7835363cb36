//! Named, read-once byte sources for archives.
//!
//! The engine never takes a raw filesystem path for its input. Anything that
//! can be opened once and read forward can feed an extraction: a file, an
//! asset bundled next to the application, or an arbitrary reader.

use std::fs::File;
use std::io::Read;
use std::io::{self};
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

/// A named byte source that can be opened exactly once.
pub trait ArchiveSource {
    /// Reader produced by [`ArchiveSource::open`].
    type Reader: Read;

    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// Consumes the source and opens it for reading.
    fn open(self) -> io::Result<Self::Reader>;
}

/// An archive stored as a regular file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
}

impl FileSource {
    /// Creates a source for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveSource for FileSource {
    type Reader = File;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// An archive shipped as a named asset inside an asset directory.
///
/// Asset names are relative and slash-separated, e.g.
/// `linux-rootfs/alpine.tar.xz`. Names that would leave the asset directory
/// are refused when opened.
#[derive(Debug, Clone)]
pub struct AssetSource {
    root: PathBuf,
    name: String,
}

impl AssetSource {
    /// Creates a source for asset `name` under `root`.
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    fn resolve(&self) -> io::Result<PathBuf> {
        let relative = Path::new(&self.name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || self.name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset name: {}", self.name),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl ArchiveSource for AssetSource {
    type Reader = File;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(self) -> io::Result<File> {
        File::open(self.resolve()?)
    }
}

/// Any reader with a name attached.
#[derive(Debug)]
pub struct ReaderSource<R> {
    name: String,
    reader: R,
}

impl<R: Read> ReaderSource<R> {
    /// Wraps `reader` under `name`.
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
        }
    }
}

impl<R: Read> ArchiveSource for ReaderSource<R> {
    type Reader = R;

    fn name(&self) -> &str {
        &self.name
    }

    fn open(self) -> io::Result<R> {
        Ok(self.reader)
    }
}

//! Archive format readers.

pub mod tar_xz;

pub use tar_xz::ArchiveEntry;
pub use tar_xz::Entries;
pub use tar_xz::TarXzReader;

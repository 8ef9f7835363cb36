//! Streaming tar.xz extraction for bootstrapping root filesystems.
//!
//! `rootstrap-core` decompresses an xz-compressed tar stream and materializes
//! it under a destination directory, reproducing directories, regular files,
//! symbolic links, hard links, permission bits and modification times. Every
//! entry name is resolved against the destination first, and entries that
//! would land outside it are skipped.
//!
//! # Examples
//!
//! ```no_run
//! use rootstrap_core::ExtractionConfig;
//! use rootstrap_core::extract_tar_xz;
//! use rootstrap_core::source::FileSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExtractionConfig::default();
//! let report = extract_tar_xz(FileSource::new("alpine.tar.xz"), "/data/rootfs", &config)?;
//! println!("Extracted {} files", report.files_extracted);
//! for skipped in &report.skipped {
//!     eprintln!("skipped {}: {}", skipped.name.display(), skipped.reason);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod copy;
pub mod error;
pub mod extraction;
pub mod formats;
pub mod io;
pub mod report;
pub mod security;
pub mod source;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod test_utils;

// Re-export main API types
pub use api::extract_tar_xz;
pub use api::extract_tar_xz_with_progress;
pub use config::ExtractionConfig;
pub use error::ExtractionError;
pub use error::Result;
pub use extraction::ExtractionState;
pub use extraction::Extractor;
pub use report::Degradation;
pub use report::ExtractionReport;
pub use report::NoopProgress;
pub use report::ProgressCallback;
pub use report::SkipReason;
pub use report::SkippedEntry;

// Re-export types module for easier access
pub use types::DestinationRoot;
pub use types::EntryKind;

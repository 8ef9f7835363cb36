//! High-level public API for tar.xz extraction.

use std::path::Path;

use crate::ExtractionConfig;
use crate::ExtractionReport;
use crate::Result;
use crate::extraction::Extractor;
use crate::report::ProgressCallback;
use crate::source::ArchiveSource;

/// Extracts a tar.xz archive into the specified output directory.
///
/// The directory is created if it does not exist. Entries that would land
/// outside it are skipped and listed in [`ExtractionReport::skipped`].
///
/// # Arguments
///
/// * `source` - Where the compressed bytes come from
/// * `output_dir` - Directory where entries will be materialized
/// * `config` - Fidelity settings for the extraction
///
/// # Errors
///
/// Returns an error if:
/// - The output directory cannot be created
/// - The source cannot be opened
/// - The xz or tar stream is corrupt
/// - A symlink or other filesystem object cannot be created
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::ExtractionConfig;
/// use rootstrap_core::extract_tar_xz;
/// use rootstrap_core::source::FileSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let report = extract_tar_xz(FileSource::new("rootfs.tar.xz"), "/tmp/rootfs", &config)?;
/// println!("Extracted {} files", report.files_extracted);
/// # Ok(())
/// # }
/// ```
pub fn extract_tar_xz<S: ArchiveSource, P: AsRef<Path>>(
    source: S,
    output_dir: P,
    config: &ExtractionConfig,
) -> Result<ExtractionReport> {
    Extractor::new(config.clone()).extract(source, output_dir)
}

/// Extracts a tar.xz archive with progress callbacks.
///
/// # Errors
///
/// Same as [`extract_tar_xz`].
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::ExtractionConfig;
/// use rootstrap_core::NoopProgress;
/// use rootstrap_core::extract_tar_xz_with_progress;
/// use rootstrap_core::source::AssetSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let source = AssetSource::new("/app/assets", "rootfs.tar.xz");
/// let mut progress = NoopProgress;
/// let report = extract_tar_xz_with_progress(
///     source,
///     "/tmp/rootfs",
///     &ExtractionConfig::default(),
///     &mut progress,
/// )?;
/// assert!(report.is_faithful());
/// # Ok(())
/// # }
/// ```
pub fn extract_tar_xz_with_progress<S: ArchiveSource, P: AsRef<Path>>(
    source: S,
    output_dir: P,
    config: &ExtractionConfig,
    progress: &mut dyn ProgressCallback,
) -> Result<ExtractionReport> {
    Extractor::new(config.clone()).extract_with_progress(source, output_dir, progress)
}

//! Core extraction engine.

use std::io::Read;
use std::path::Path;
use std::time::Instant;

use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::ExtractionConfig;
use crate::ExtractionError;
use crate::ExtractionReport;
use crate::Result;
use crate::formats::TarXzReader;
use crate::io::StreamStats;
use crate::report::NoopProgress;
use crate::report::ProgressCallback;
use crate::report::SkipReason;
use crate::security::SecurityGuard;
use crate::source::ArchiveSource;
use crate::types::DestinationRoot;

use super::materialize::EntryMaterializer;
use super::materialize::EntryMeta;
use super::materialize::EntryOutcome;

/// Lifecycle of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    /// Nothing has started.
    Idle,
    /// Creating and canonicalizing the destination root.
    EnsuringDestination,
    /// Reading and materializing entries.
    Streaming,
    /// The archive was fully consumed without a fatal error.
    Done,
    /// A fatal error stopped the extraction; a partial tree may remain.
    Aborted,
}

/// Main extraction engine.
///
/// # Examples
///
/// ```no_run
/// use rootstrap_core::ExtractionConfig;
/// use rootstrap_core::extraction::ExtractionState;
/// use rootstrap_core::extraction::Extractor;
/// use rootstrap_core::source::FileSource;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut extractor = Extractor::new(ExtractionConfig::default());
/// let report = extractor.extract(FileSource::new("rootfs.tar.xz"), "/data/rootfs")?;
/// assert_eq!(extractor.state(), ExtractionState::Done);
/// println!("{} entries", report.total_items());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Extractor {
    config: ExtractionConfig,
    state: ExtractionState,
}

impl Extractor {
    /// Creates a new extraction engine with the given configuration.
    #[must_use]
    pub const fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            state: ExtractionState::Idle,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// State reached by the last extraction.
    #[must_use]
    pub const fn state(&self) -> ExtractionState {
        self.state
    }

    /// Extracts `source` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be created, the source
    /// cannot be opened, the stream is corrupt, or an object cannot be
    /// created. Entries that escape the destination are skipped and listed
    /// in the report instead.
    pub fn extract<S, P>(&mut self, source: S, dest: P) -> Result<ExtractionReport>
    where
        S: ArchiveSource,
        P: AsRef<Path>,
    {
        self.extract_with_progress(source, dest, &mut NoopProgress)
    }

    /// Extracts `source` into `dest`, reporting per-entry progress.
    ///
    /// # Errors
    ///
    /// See [`Extractor::extract`].
    pub fn extract_with_progress<S, P>(
        &mut self,
        source: S,
        dest: P,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ExtractionReport>
    where
        S: ArchiveSource,
        P: AsRef<Path>,
    {
        let start = Instant::now();
        self.state = ExtractionState::Idle;

        match self.run(source, dest.as_ref(), progress) {
            Ok(mut report) => {
                report.duration = start.elapsed();
                self.transition(ExtractionState::Done);
                progress.on_complete();
                info!(
                    files = report.files_extracted,
                    directories = report.directories_created,
                    symlinks = report.symlinks_created,
                    hardlinks = report.hardlinks_created,
                    skipped = report.skipped.len(),
                    degraded = report.degradations.len(),
                    bytes = report.bytes_written,
                    "extraction complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(ExtractionState::Aborted);
                error!(error = %e, "extraction aborted");
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: ExtractionState) {
        debug!(from = ?self.state, to = ?next, "extraction state");
        self.state = next;
    }

    fn run<S: ArchiveSource>(
        &mut self,
        source: S,
        dest: &Path,
        progress: &mut dyn ProgressCallback,
    ) -> Result<ExtractionReport> {
        self.transition(ExtractionState::EnsuringDestination);
        let root = DestinationRoot::ensure(dest).map_err(|source| {
            ExtractionError::DestinationCreation {
                path: dest.to_path_buf(),
                source,
            }
        })?;
        debug!(root = %root.as_path().display(), "destination ready");

        let mut reader = TarXzReader::open(source)?;
        self.transition(ExtractionState::Streaming);

        let guard = SecurityGuard::new(root);
        let mut report = ExtractionReport::new();
        stream_entries(&mut reader, &guard, &self.config, progress, &mut report)?;

        let stats = reader.finish()?;
        report.bytes_read = stats.compressed_bytes();
        Ok(report)
    }
}

fn stream_entries<R: Read>(
    reader: &mut TarXzReader<R>,
    guard: &SecurityGuard,
    config: &ExtractionConfig,
    progress: &mut dyn ProgressCallback,
    report: &mut ExtractionReport,
) -> Result<()> {
    let stats = reader.stats_handle();
    let mut materializer = EntryMaterializer::new(guard, config);

    for (index, entry) in reader.entries()?.enumerate() {
        let mut entry = entry?;
        let name = entry.name().to_path_buf();
        progress.on_entry_start(&name, index + 1);

        let Some(kind) = entry.kind().cloned() else {
            let type_flag = entry.type_flag();
            debug!(entry = %name.display(), type_flag = %char::from(type_flag), "skipping unsupported entry type");
            report.add_skipped(name.clone(), SkipReason::UnsupportedKind { type_flag });
            progress.on_entry_complete(&name);
            continue;
        };

        let path = match guard.resolve_entry(&name, &kind) {
            Ok(path) => path,
            Err(violation) => {
                warn!(entry = %name.display(), %violation, "skipping entry outside destination");
                report.add_skipped(name.clone(), SkipReason::PathTraversal);
                progress.on_entry_complete(&name);
                continue;
            }
        };

        let meta = EntryMeta {
            mode: entry.mode(),
            mtime: entry.mtime(),
            size: entry.size(),
        };
        debug!(entry = %name.display(), ?kind, "materializing");

        match materializer.materialize(&path, &kind, meta, &mut entry, report) {
            Ok(EntryOutcome::Created { bytes }) => {
                if bytes > 0 {
                    progress.on_bytes_written(bytes);
                }
            }
            Ok(EntryOutcome::Skipped(reason)) => {
                warn!(entry = %name.display(), %reason, "entry skipped");
                report.add_skipped(name.clone(), reason);
            }
            Err(e) => return Err(reclassify(&stats, e)),
        }
        progress.on_entry_complete(&name);
    }

    materializer.finish(report);
    Ok(())
}

/// A write failure caused by the content reader is a stream failure.
fn reclassify(stats: &StreamStats, err: ExtractionError) -> ExtractionError {
    match err {
        ExtractionError::Io { source, .. } if stats.decoder_failed() => {
            ExtractionError::Decompression(source)
        }
        other => other,
    }
}

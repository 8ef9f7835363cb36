//! Subcommand implementations.

pub mod completion;
pub mod extract;
pub mod install;
pub mod remove;
pub mod status;

use crate::error::add_archive_context;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use rootstrap_core::ExtractionConfig;
use rootstrap_core::ExtractionReport;
use rootstrap_core::NoopProgress;
use rootstrap_core::ProgressCallback;
use rootstrap_core::extract_tar_xz_with_progress;
use rootstrap_core::source::FileSource;
use rootstrap_core::source::ReaderSource;
use std::io;
use std::path::Path;

/// Extracts `archive` into `dest`. An archive path of `-` reads stdin.
fn run_extraction(
    archive: &Path,
    dest: &Path,
    config: &ExtractionConfig,
    show_progress: bool,
    label: &str,
) -> Result<ExtractionReport> {
    let mut spinner;
    let mut noop = NoopProgress;
    let progress: &mut dyn ProgressCallback = if show_progress {
        spinner = CliProgress::new(label);
        &mut spinner
    } else {
        &mut noop
    };

    let result = if archive == Path::new("-") {
        let source = ReaderSource::new("<stdin>", io::stdin().lock());
        extract_tar_xz_with_progress(source, dest, config, progress)
    } else {
        extract_tar_xz_with_progress(FileSource::new(archive), dest, config, progress)
    };
    add_archive_context(result, archive)
}

fn warn_about_losses(report: &ExtractionReport, formatter: &dyn OutputFormatter) {
    let escapes = report.traversal_violations();
    if escapes > 0 {
        formatter.format_warning(&format!(
            "{escapes} entries pointed outside the destination and were skipped"
        ));
    }
    let other_skips = report.skipped.len() - escapes;
    if other_skips > 0 {
        formatter.format_warning(&format!("{other_skips} other entries were skipped"));
    }
    if !report.degradations.is_empty() {
        formatter.format_warning(&format!(
            "{} entries were extracted with reduced fidelity",
            report.degradations.len()
        ));
    }
}

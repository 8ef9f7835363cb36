//! Extract command implementation.

use super::run_extraction;
use super::warn_about_losses;
use crate::cli::ExtractArgs;
use crate::output::OutputFormatter;
use anyhow::Context;
use anyhow::Result;
use std::env;

pub fn execute(
    args: &ExtractArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<()> {
    let output_dir = match &args.output_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to get current directory")?,
    };

    let report = run_extraction(
        &args.archive,
        &output_dir,
        &args.fidelity.to_config(),
        show_progress,
        "Extracting",
    )?;

    warn_about_losses(&report, formatter);
    formatter.format_extraction_result(&output_dir, &report)
}

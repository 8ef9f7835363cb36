//! Status command implementation.

use crate::cli::StatusArgs;
use crate::output::OutputFormatter;
use crate::rootfs::Rootfs;
use anyhow::Result;

pub fn execute(args: &StatusArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    formatter.format_status(&Rootfs::new(&args.rootfs_dir).status())
}

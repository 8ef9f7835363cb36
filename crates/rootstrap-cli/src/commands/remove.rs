//! Remove command implementation.

use crate::cli::RemoveArgs;
use crate::output::OutputFormatter;
use crate::rootfs::Rootfs;
use anyhow::Result;
use anyhow::bail;

pub fn execute(args: &RemoveArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    let rootfs = Rootfs::new(&args.rootfs_dir);

    let status = rootfs.status();
    if status.exists && !status.ready && !args.force {
        bail!(
            "'{}' is not an installed root filesystem (no {} marker)\n\
             HINT: Use --force to remove it anyway.",
            rootfs.dir().display(),
            crate::rootfs::READY_MARKER
        );
    }

    let removed = rootfs.remove()?;
    formatter.format_removal(rootfs.dir(), removed)
}

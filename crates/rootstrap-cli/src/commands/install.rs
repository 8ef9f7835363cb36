//! Install command implementation.
//!
//! Extracts the archive, applies the bundled `resolv.conf` override and
//! writes the ready marker last.

use super::run_extraction;
use super::warn_about_losses;
use crate::cli::InstallArgs;
use crate::output::OutputFormatter;
use crate::rootfs::InstallSummary;
use crate::rootfs::ResolvConf;
use crate::rootfs::Rootfs;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use tracing::info;

pub fn execute(
    args: &InstallArgs,
    formatter: &dyn OutputFormatter,
    show_progress: bool,
) -> Result<()> {
    let rootfs = Rootfs::new(&args.rootfs_dir);

    let reinstalled = rootfs.is_ready();
    if reinstalled {
        if !args.force {
            bail!(
                "Root filesystem at '{}' is already installed\n\
                 HINT: Use --force to reinstall over it, or run `rootstrap remove` first.",
                rootfs.dir().display()
            );
        }
        rootfs.clear_ready().with_context(|| {
            format!("cannot clear ready marker in '{}'", rootfs.dir().display())
        })?;
    }

    let report = run_extraction(
        &args.archive,
        rootfs.dir(),
        &args.fidelity.to_config(),
        show_progress,
        "Installing",
    )?;
    warn_about_losses(&report, formatter);

    let resolv_conf = match rootfs.apply_resolv_conf_override() {
        Ok(outcome) => outcome,
        Err(err) => {
            formatter.format_warning(&format!("resolv.conf override not applied: {err:#}"));
            ResolvConf::Kept
        }
    };

    rootfs.mark_ready().with_context(|| {
        format!(
            "cannot create ready marker '{}'",
            rootfs.ready_marker().display()
        )
    })?;
    info!(path = %rootfs.dir().display(), "root filesystem ready");

    formatter.format_install_result(&InstallSummary {
        rootfs_dir: rootfs.dir(),
        report: &report,
        resolv_conf,
        reinstalled,
    })
}

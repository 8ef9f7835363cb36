//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use rootstrap_core::ExtractionConfig;
use rootstrap_core::extraction::LinkStrategy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rootstrap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract a tar.xz archive into a directory
    Extract(ExtractArgs),
    /// Install a root filesystem from a tar.xz archive
    Install(InstallArgs),
    /// Show whether a root filesystem is installed
    Status(StatusArgs),
    /// Delete an installed root filesystem
    Remove(RemoveArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

impl Commands {
    /// Operation name used in JSON output.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Extract(_) => "extract",
            Self::Install(_) => "install",
            Self::Status(_) => "status",
            Self::Remove(_) => "remove",
            Self::Completion(_) => "completion",
        }
    }
}

/// Flags that turn off individual fidelity features.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FidelityArgs {
    /// Do not apply permission bits from the archive
    #[arg(long)]
    pub no_permissions: bool,

    /// Do not apply modification times from the archive
    #[arg(long)]
    pub no_mtime: bool,

    /// Skip hard links that cannot be linked instead of copying their target
    #[arg(long)]
    pub no_hardlink_copy: bool,

    /// Permission bits kept from archive modes, in octal
    #[arg(long, value_name = "OCTAL", value_parser = parse_mode_mask)]
    pub mode_mask: Option<u32>,
}

impl FidelityArgs {
    pub fn to_config(&self) -> ExtractionConfig {
        let mut config = ExtractionConfig::default()
            .with_preserve_permissions(!self.no_permissions)
            .with_preserve_mtime(!self.no_mtime);
        if self.no_hardlink_copy {
            config = config.with_link_strategies(vec![LinkStrategy::HardLink]);
        }
        if let Some(mask) = self.mode_mask {
            config = config.with_mode_mask(mask);
        }
        config
    }
}

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Path to the tar.xz archive, or '-' for standard input
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Output directory (default: current directory)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub fidelity: FidelityArgs,
}

#[derive(clap::Args)]
pub struct InstallArgs {
    /// Path to the root filesystem tar.xz archive, or '-' for standard input
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Directory that receives the root filesystem
    #[arg(value_name = "ROOTFS_DIR")]
    pub rootfs_dir: PathBuf,

    /// Reinstall over a root filesystem that is already marked ready
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub fidelity: FidelityArgs,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Root filesystem directory
    #[arg(value_name = "ROOTFS_DIR")]
    pub rootfs_dir: PathBuf,
}

#[derive(clap::Args)]
pub struct RemoveArgs {
    /// Root filesystem directory
    #[arg(value_name = "ROOTFS_DIR")]
    pub rootfs_dir: PathBuf,

    /// Remove the directory even if it is not marked ready
    #[arg(short, long)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Parse an octal permission mask such as `755` or `0o7777`
fn parse_mode_mask(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0o")
        .or_else(|| s.strip_prefix("0O"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Err("empty mode mask".to_string());
    }

    let mask = u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode: {s}"))?;
    if mask > 0o7777 {
        return Err(format!("mode mask out of range (max 7777): {s}"));
    }
    Ok(mask)
}

//! Human-readable output formatter with colors and styling.

use super::formatter::OutputFormatter;
use crate::rootfs::InstallSummary;
use crate::rootfs::ResolvConf;
use crate::rootfs::RootfsStatus;
use anyhow::Result;
use console::Term;
use console::style;
use rootstrap_core::ExtractionReport;
use std::path::Path;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
    err_term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
            err_term: Term::stderr(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let digits = n.to_string();
        let mut result = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn headline(&self, message: &str) {
        if self.use_colors {
            self.line(&format!("{} {message}", style("✓").green().bold()));
        } else {
            self.line(message);
        }
    }

    fn write_report(&self, report: &ExtractionReport) {
        self.line(&format!(
            "  Files extracted: {}",
            Self::format_number(report.files_extracted)
        ));
        self.line(&format!(
            "  Directories:     {}",
            Self::format_number(report.directories_created)
        ));
        self.line(&format!(
            "  Symlinks:        {}",
            Self::format_number(report.symlinks_created)
        ));
        self.line(&format!(
            "  Hard links:      {}",
            Self::format_number(report.hardlinks_created)
        ));
        self.line(&format!(
            "  Total size:      {}",
            Self::format_size(report.bytes_written)
        ));

        if self.verbose {
            self.line(&format!(
                "  Archive read:    {}",
                Self::format_size(report.bytes_read)
            ));
            self.line(&format!("  Duration:        {:?}", report.duration));
        }

        if !report.skipped.is_empty() {
            self.line(&format!(
                "  Skipped:         {}",
                Self::format_number(report.skipped.len())
            ));
        }
        if !report.degradations.is_empty() {
            self.line(&format!(
                "  Degraded:        {}",
                Self::format_number(report.degradations.len())
            ));
        }

        if self.verbose {
            self.write_issues(report);
        }
    }

    fn write_issues(&self, report: &ExtractionReport) {
        if !report.skipped.is_empty() {
            self.line("");
            self.line(&self.section("Skipped entries:"));
            for entry in &report.skipped {
                self.line(&format!("  - {}: {}", entry.name.display(), entry.reason));
            }
        }
        if !report.degradations.is_empty() {
            self.line("");
            self.line(&self.section("Degradations:"));
            for degradation in &report.degradations {
                self.line(&format!("  - {degradation}"));
            }
        }
    }

    fn section(&self, title: &str) -> String {
        if self.use_colors {
            style(title).yellow().bold().to_string()
        } else {
            title.to_string()
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_extraction_result(
        &self,
        output_dir: &Path,
        report: &ExtractionReport,
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.headline(&format!("Extracted into {}", output_dir.display()));
        self.write_report(report);
        Ok(())
    }

    fn format_install_result(&self, summary: &InstallSummary<'_>) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let verb = if summary.reinstalled {
            "reinstalled"
        } else {
            "installed"
        };
        self.headline(&format!(
            "Root filesystem {verb} at {}",
            summary.rootfs_dir.display()
        ));
        self.write_report(summary.report);
        match summary.resolv_conf {
            ResolvConf::Applied => self.line("  resolv.conf:     override applied"),
            ResolvConf::Kept => self.line("  resolv.conf:     override kept"),
            ResolvConf::NotPresent => {}
        }
        Ok(())
    }

    fn format_status(&self, status: &RootfsStatus) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        let state = match (status.exists, status.ready) {
            (_, true) => "ready",
            (true, false) => "incomplete",
            (false, false) => "not installed",
        };
        let state = if self.use_colors {
            match (status.exists, status.ready) {
                (_, true) => style(state).green().bold().to_string(),
                (true, false) => style(state).yellow().bold().to_string(),
                (false, false) => style(state).dim().to_string(),
            }
        } else {
            state.to_string()
        };
        self.line(&format!("{}: {state}", status.path.display()));
        Ok(())
    }

    fn format_removal(&self, rootfs_dir: &Path, removed: bool) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if removed {
            self.headline(&format!("Removed {}", rootfs_dir.display()));
        } else {
            self.line(&format!("Nothing to remove at {}", rootfs_dir.display()));
        }
        Ok(())
    }

    fn format_error(&self, error: &anyhow::Error) {
        // Always show errors, even in quiet mode
        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {error:?}", style("ERROR:").red().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("ERROR: {error:?}"));
        }
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = self
                .err_term
                .write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = self.err_term.write_line(&format!("WARNING: {message}"));
        }
    }
}

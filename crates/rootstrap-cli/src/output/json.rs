//! JSON output formatter for machine-readable results.

use super::formatter::JsonOutput;
use super::formatter::OutputFormatter;
use crate::rootfs::InstallSummary;
use crate::rootfs::ResolvConf;
use crate::rootfs::RootfsStatus;
use anyhow::Result;
use rootstrap_core::ExtractionReport;
use serde::Serialize;
use std::io::Write;
use std::io::{self};
use std::path::Path;

pub struct JsonFormatter {
    operation: &'static str,
}

#[derive(Debug, Serialize)]
struct SkippedOutput {
    name: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ReportOutput {
    files_extracted: usize,
    directories_created: usize,
    symlinks_created: usize,
    hardlinks_created: usize,
    bytes_written: u64,
    bytes_read: u64,
    duration_ms: u128,
    faithful: bool,
    skipped: Vec<SkippedOutput>,
    degradations: Vec<String>,
}

impl From<&ExtractionReport> for ReportOutput {
    fn from(report: &ExtractionReport) -> Self {
        Self {
            files_extracted: report.files_extracted,
            directories_created: report.directories_created,
            symlinks_created: report.symlinks_created,
            hardlinks_created: report.hardlinks_created,
            bytes_written: report.bytes_written,
            bytes_read: report.bytes_read,
            duration_ms: report.duration.as_millis(),
            faithful: report.is_faithful(),
            skipped: report
                .skipped
                .iter()
                .map(|entry| SkippedOutput {
                    name: entry.name.display().to_string(),
                    reason: entry.reason.to_string(),
                })
                .collect(),
            degradations: report.degradations.iter().map(ToString::to_string).collect(),
        }
    }
}

impl JsonFormatter {
    pub const fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_extraction_result(
        &self,
        output_dir: &Path,
        report: &ExtractionReport,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct ExtractionOutput {
            output_dir: String,
            #[serde(flatten)]
            report: ReportOutput,
        }

        let data = ExtractionOutput {
            output_dir: output_dir.display().to_string(),
            report: report.into(),
        };
        Self::output(&JsonOutput::success(self.operation, data))
    }

    fn format_install_result(&self, summary: &InstallSummary<'_>) -> Result<()> {
        #[derive(Serialize)]
        struct InstallOutput {
            rootfs_dir: String,
            reinstalled: bool,
            resolv_conf: ResolvConf,
            #[serde(flatten)]
            report: ReportOutput,
        }

        let data = InstallOutput {
            rootfs_dir: summary.rootfs_dir.display().to_string(),
            reinstalled: summary.reinstalled,
            resolv_conf: summary.resolv_conf,
            report: summary.report.into(),
        };
        Self::output(&JsonOutput::success(self.operation, data))
    }

    fn format_status(&self, status: &RootfsStatus) -> Result<()> {
        Self::output(&JsonOutput::success(self.operation, status))
    }

    fn format_removal(&self, rootfs_dir: &Path, removed: bool) -> Result<()> {
        #[derive(Serialize)]
        struct RemovalOutput {
            rootfs_dir: String,
            removed: bool,
        }

        let data = RemovalOutput {
            rootfs_dir: rootfs_dir.display().to_string(),
            removed,
        };
        Self::output(&JsonOutput::success(self.operation, data))
    }

    fn format_error(&self, error: &anyhow::Error) {
        let output = JsonOutput::<()>::error(self.operation, format!("{error:#}"));
        let _ = Self::output(&output);
    }

    /// Warnings go to the log so stdout stays a single JSON document.
    fn format_warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rootstrap_core::SkipReason;

    #[test]
    fn test_report_output_lists_skips_and_degradations() {
        let mut report = ExtractionReport::new();
        report.files_extracted = 2;
        report.add_skipped("../evil", SkipReason::PathTraversal);

        let json = serde_json::to_value(ReportOutput::from(&report)).unwrap();
        assert_eq!(json["files_extracted"], 2);
        assert_eq!(json["faithful"], false);
        assert_eq!(json["skipped"][0]["name"], "../evil");
        assert_eq!(json["skipped"][0]["reason"], "path escapes destination");
        assert!(json["degradations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_error_envelope() {
        let output = JsonOutput::<()>::error("install", "boom");
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["operation"], "install");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_status_serialization() {
        let status = RootfsStatus {
            path: "/data/rootfs".into(),
            exists: true,
            ready: false,
        };
        let json = serde_json::to_value(JsonOutput::success("status", &status)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["ready"], false);
        assert_eq!(json["data"]["path"], "/data/rootfs");
    }
}

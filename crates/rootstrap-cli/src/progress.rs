//! Progress spinner for CLI extraction.

use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressState;
use indicatif::ProgressStyle;
use rootstrap_core::ProgressCallback;
use std::fmt::Write;
use std::path::Path;
use std::time::Duration;

/// CLI spinner implementing `ProgressCallback`.
///
/// A tar stream does not announce its entry count, so this shows a spinner
/// with bytes written, throughput, elapsed time, the running entry count and
/// the entry being processed. Cleans up on drop.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a new spinner with `message` as its prefix (e.g. "Extracting").
    #[must_use]
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();

        // Template: "⠋ Extracting 15.2 MiB (5.1 MiB/s, 12s) 1204 usr/lib/libc.so"
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(
                    "{spinner:.cyan} {prefix} {binary_bytes} ({binary_bytes_per_sec}, {elapsed_short}) {wide_msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .with_key("elapsed_short", |state: &ProgressState, w: &mut dyn Write| {
                    write!(w, "{}", humanize_duration(state.elapsed())).unwrap_or(());
                }),
        );
        bar.set_prefix(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// indicatif draws to stderr, so that is the stream that must be a TTY.
    #[must_use]
    pub fn should_show() -> bool {
        Term::stderr().is_term()
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for CliProgress {
    fn on_entry_start(&mut self, path: &Path, current: usize) {
        self.bar.set_message(format!("{current} {}", path.display()));
    }

    fn on_bytes_written(&mut self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn on_entry_complete(&mut self, _path: &Path) {}

    fn on_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Converts duration to human-readable format.
fn humanize_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

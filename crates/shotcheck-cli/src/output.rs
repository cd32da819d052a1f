//! Output formatting and progress reporting

use clap::ValueEnum;
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use shotcheck::ComparisonSummary;
use std::time::Duration;

/// Output format for comparison results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// One-line human description of a comparison
#[must_use]
pub fn describe(name: &str, summary: &ComparisonSummary) -> String {
    if !summary.dimensions_match {
        return format!("{name}: size changed (diff canvas {})", dims(summary.diff_dimensions));
    }
    let mut line = format!(
        "{name}: {:.4}% different ({} of {} pixels, tolerance {}%)",
        summary.difference_percentage,
        summary.diff_pixel_count,
        summary.total_pixels,
        summary.tolerance
    );
    if let Some(region) = summary.changed_region {
        line.push_str(&format!(", changed region {region}"));
    }
    line
}

fn dims(d: Option<(u32, u32)>) -> String {
    d.map_or_else(|| "-".to_string(), |(w, h)| format!("{w}x{h}"))
}

/// Progress reporter for comparisons
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar for a suite
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Increment progress
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Update progress message
    pub fn set_message(&self, message: &str) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(message.to_string());
        }
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, message: &str) {
        match self.progress_bar {
            Some(ref pb) if !pb.is_finished() => pb.println(message),
            _ => {
                let _ = self.term.write_line(message);
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };

        self.line(&format!("{prefix} {message}"));
    }

    /// Print suite summary
    pub fn summary(&self, passed: usize, failed: usize, errored: usize, duration: Duration) {
        if self.quiet && failed == 0 && errored == 0 {
            return;
        }

        let _ = self.term.write_line("");

        let total = passed + failed + errored;
        let duration_secs = duration.as_secs_f64();
        let ok = failed == 0 && errored == 0;

        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();

            let status = if ok {
                passed_style.apply_to("PASSED")
            } else {
                failed_style.apply_to("FAILED")
            };

            let _ = self.term.write_line(&format!(
                "{} {} checks in {:.2}s ({} passed, {} failed, {} errors)",
                status,
                total,
                duration_secs,
                passed_style.apply_to(passed),
                failed_style.apply_to(failed),
                failed_style.apply_to(errored),
            ));
        } else {
            let status = if ok { "PASSED" } else { "FAILED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} checks in {duration_secs:.2}s ({passed} passed, {failed} failed, {errored} errors)"
            ));
        }
    }
}

//! Suite execution and reports

use crate::config::{CheckSpec, SuiteConfig};
use crate::error::CliResult;
use crate::output::{describe, ProgressReporter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shotcheck::{
    BaselineStore, CaptureAdapter, Comparator, ComparisonResult, ComparisonSummary, DiffEngine,
    FsBaselineStore,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// Within tolerance
    Passed,
    /// Visual mismatch
    Failed,
    /// Capture, baseline or input failure
    Error,
    /// Baseline written
    Approved,
}

/// Report entry for one check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Baseline name
    pub name: String,
    /// Captured page
    pub url: String,
    /// Outcome
    pub status: CheckStatus,
    /// Comparison details when a comparison ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ComparisonSummary>,
    /// Diff overlay written for a mismatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_path: Option<PathBuf>,
    /// Failure reason for errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time for this check
    pub duration_ms: u64,
}

/// Report for a whole suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Total wall time
    pub duration_ms: u64,
    /// Checks passed or approved
    pub passed: usize,
    /// Visual mismatches
    pub failed: usize,
    /// Checks that could not be compared
    pub errors: usize,
    /// Per-check entries in suite order
    pub checks: Vec<CheckReport>,
}

impl SuiteReport {
    /// Whether every check passed
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    /// Write as pretty JSON
    pub fn write_json(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Write `<dir>/<name>_diff.png` if the result carries an overlay
pub fn write_diff(dir: &Path, name: &str, result: &ComparisonResult) -> CliResult<Option<PathBuf>> {
    let Some(png) = result.diff_png()? else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{name}_diff.png"));
    std::fs::write(&path, png)?;
    Ok(Some(path))
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Runs a suite's checks in order on one capture session
#[derive(Debug)]
pub struct SuiteRunner<S: BaselineStore> {
    suite: SuiteConfig,
    comparator: Comparator<S>,
}

impl SuiteRunner<FsBaselineStore> {
    /// Runner storing baselines in the suite's baseline directory
    #[must_use]
    pub fn new(suite: SuiteConfig) -> Self {
        let store = FsBaselineStore::new(&suite.baseline_dir);
        Self::with_store(suite, store)
    }
}

impl<S: BaselineStore> SuiteRunner<S> {
    /// Runner over an explicit store
    #[must_use]
    pub fn with_store(suite: SuiteConfig, store: S) -> Self {
        let comparator = Comparator::new(store)
            .with_engine(DiffEngine::new().with_noise_threshold(suite.noise_threshold))
            .with_capture_timeout(Duration::from_secs(suite.capture_timeout_secs));
        Self { suite, comparator }
    }

    /// Suite being run
    #[must_use]
    pub const fn suite(&self) -> &SuiteConfig {
        &self.suite
    }

    /// Compare (or with `approve`, capture and store) every check.
    ///
    /// A failing check never stops the run; its error is recorded.
    pub async fn run<A>(
        &self,
        adapter: &mut A,
        reporter: &mut ProgressReporter,
        approve: bool,
    ) -> SuiteReport
    where
        A: CaptureAdapter + ?Sized,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let total = self.suite.checks.len();
        reporter.start_progress(total as u64, "checks");

        let mut checks = Vec::with_capacity(total);
        for check in &self.suite.checks {
            reporter.set_message(&check.name);
            let report = self.run_check(adapter, check, approve).await;
            match report.status {
                CheckStatus::Passed | CheckStatus::Approved => {
                    let line = report.result.as_ref().map_or_else(
                        || format!("{} approved", report.name),
                        |s| describe(&report.name, s),
                    );
                    reporter.success(&line);
                }
                CheckStatus::Failed => {
                    let line = report
                        .result
                        .as_ref()
                        .map_or_else(|| report.name.clone(), |s| describe(&report.name, s));
                    reporter.failure(&line);
                }
                CheckStatus::Error => {
                    reporter.failure(&format!(
                        "{}: {}",
                        report.name,
                        report.error.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
            reporter.increment(1);
            checks.push(report);
        }
        reporter.finish();

        let passed = checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Passed | CheckStatus::Approved))
            .count();
        let failed = checks.iter().filter(|c| c.status == CheckStatus::Failed).count();
        let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
        let duration = start.elapsed();
        reporter.summary(passed, failed, errors, duration);
        info!(passed, failed, errors, "suite finished");

        SuiteReport {
            started_at,
            duration_ms: millis(duration),
            passed,
            failed,
            errors,
            checks,
        }
    }

    async fn run_check<A>(
        &self,
        adapter: &mut A,
        check: &CheckSpec,
        approve: bool,
    ) -> CheckReport
    where
        A: CaptureAdapter + ?Sized,
    {
        let start = Instant::now();
        let mut report = CheckReport {
            name: check.name.clone(),
            url: check.url.clone(),
            status: CheckStatus::Error,
            result: None,
            diff_path: None,
            error: None,
            duration_ms: 0,
        };

        let outcome = self.execute(adapter, check, approve, &mut report).await;
        if let Err(e) = outcome {
            warn!(check = %check.name, error = %e, "check errored");
            report.status = CheckStatus::Error;
            report.error = Some(e.to_string());
        }
        report.duration_ms = millis(start.elapsed());
        report
    }

    async fn execute<A>(
        &self,
        adapter: &mut A,
        check: &CheckSpec,
        approve: bool,
        report: &mut CheckReport,
    ) -> CliResult<()>
    where
        A: CaptureAdapter + ?Sized,
    {
        let options = check.options(self.suite.tolerance)?;
        if approve {
            self.comparator
                .approve(adapter, &check.name, &check.url, &options)
                .await?;
            report.status = CheckStatus::Approved;
            return Ok(());
        }

        let result = self
            .comparator
            .compare(adapter, &check.name, &check.url, &options)
            .await?;
        if !result.matches {
            report.diff_path = write_diff(&self.suite.diff_dir, &check.name, &result)?;
        }
        report.status = if result.matches {
            CheckStatus::Passed
        } else {
            CheckStatus::Failed
        };
        report.result = Some(result.summary());
        Ok(())
    }
}

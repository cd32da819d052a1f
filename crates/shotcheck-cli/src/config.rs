//! CLI configuration and YAML suite files

use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use shotcheck::{CompareOptions, Rect, Tolerance, DEFAULT_NOISE_THRESHOLD};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Log filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info,shotcheck=debug",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// One named check in a suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Baseline name
    pub name: String,
    /// Page to capture
    pub url: String,
    /// Element to scope the comparison to
    #[serde(default)]
    pub selector: Option<String>,
    /// Regions to blank, as `"x,y,w,h"` strings
    #[serde(default)]
    pub mask: Vec<String>,
    /// Overrides the suite tolerance
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl CheckSpec {
    /// Build comparison options, falling back to the suite tolerance
    pub fn options(&self, default_tolerance: f64) -> CliResult<CompareOptions> {
        let mut options =
            CompareOptions::new().with_tolerance(self.tolerance.unwrap_or(default_tolerance));
        if let Some(ref selector) = self.selector {
            options = options.with_selector(selector.clone());
        }
        for raw in &self.mask {
            let rect: Rect = raw.parse().map_err(|e| {
                CliError::config(format!("check {:?}: bad mask {raw:?}: {e}", self.name))
            })?;
            options = options.with_mask(rect);
        }
        Ok(options)
    }
}

/// A YAML suite of checks sharing one browser session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Directory of baseline PNGs
    #[serde(default = "default_baseline_dir")]
    pub baseline_dir: PathBuf,
    /// Directory diff overlays are written to
    #[serde(default = "default_diff_dir")]
    pub diff_dir: PathBuf,
    /// Viewport for every capture
    #[serde(default)]
    pub viewport: Viewport,
    /// Default tolerance percentage
    #[serde(default)]
    pub tolerance: f64,
    /// Per-pixel channel delta ignored as noise
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: u32,
    /// Seconds allowed for each capture
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_secs: u64,
    /// Seconds to wait for each page to finish loading
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
    /// Checks to run, in order
    pub checks: Vec<CheckSpec>,
}

fn default_baseline_dir() -> PathBuf {
    PathBuf::from("baselines")
}

fn default_diff_dir() -> PathBuf {
    PathBuf::from("diffs")
}

const fn default_noise_threshold() -> u32 {
    DEFAULT_NOISE_THRESHOLD
}

const fn default_capture_timeout() -> u64 {
    90
}

const fn default_ready_timeout() -> u64 {
    60
}

impl SuiteConfig {
    /// Parse and validate a suite from YAML text
    pub fn from_yaml(text: &str) -> CliResult<Self> {
        let suite: Self = serde_yaml_ng::from_str(text)?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load a suite file; relative directories resolve against the file's
    /// parent directory
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut suite = Self::from_yaml(&text)?;
        if let Some(parent) = path.parent() {
            if suite.baseline_dir.is_relative() {
                suite.baseline_dir = parent.join(&suite.baseline_dir);
            }
            if suite.diff_dir.is_relative() {
                suite.diff_dir = parent.join(&suite.diff_dir);
            }
        }
        Ok(suite)
    }

    /// Reject suites that could never run
    pub fn validate(&self) -> CliResult<()> {
        if self.checks.is_empty() {
            return Err(CliError::config("suite has no checks"));
        }
        Tolerance::percent(self.tolerance)
            .map_err(|e| CliError::config(format!("suite tolerance: {e}")))?;
        if self.ready_timeout_secs >= self.capture_timeout_secs {
            return Err(CliError::config(format!(
                "ready_timeout_secs ({}) must be below capture_timeout_secs ({})",
                self.ready_timeout_secs, self.capture_timeout_secs
            )));
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            if !seen.insert(check.name.as_str()) {
                return Err(CliError::config(format!(
                    "duplicate check name {:?}",
                    check.name
                )));
            }
            let options = check.options(self.tolerance)?;
            Tolerance::percent(options.tolerance)
                .map_err(|e| CliError::config(format!("check {:?}: {e}", check.name)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
baseline_dir: baselines
diff_dir: diffs
viewport: { width: 1024, height: 768 }
tolerance: 0.0
noise_threshold: 12
checks:
  - name: home
    url: http://localhost:8080/
  - name: table
    url: http://localhost:8080/computers
    selector: .computers
    mask: ["0,0,200,40"]
    tolerance: 0.5
"#;

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = CliConfig::new();
            assert_eq!(config.verbosity, Verbosity::Normal);
            assert_eq!(config.color, ColorChoice::Auto);
        }

        #[test]
        fn test_builder() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Debug)
                .with_color(ColorChoice::Never);
            assert!(config.verbosity.is_verbose());
            assert!(!config.color.should_color());
            assert!(ColorChoice::Always.should_color());
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Quiet.log_filter(), "error");
            assert!(Verbosity::Quiet.is_quiet());
            assert_eq!(Verbosity::Debug.log_filter(), "debug");
        }
    }

    mod suite_tests {
        use super::*;

        #[test]
        fn test_parse_full_suite() {
            let suite = SuiteConfig::from_yaml(SUITE).unwrap();
            assert_eq!(suite.viewport, Viewport { width: 1024, height: 768 });
            assert_eq!(suite.noise_threshold, 12);
            assert_eq!(suite.checks.len(), 2);
            assert_eq!(suite.checks[1].selector.as_deref(), Some(".computers"));
        }

        #[test]
        fn test_defaults_applied() {
            let suite =
                SuiteConfig::from_yaml("checks:\n  - name: a\n    url: http://x/\n").unwrap();
            assert_eq!(suite.baseline_dir, PathBuf::from("baselines"));
            assert_eq!(suite.diff_dir, PathBuf::from("diffs"));
            assert_eq!(suite.viewport, Viewport::default());
            assert_eq!(suite.noise_threshold, DEFAULT_NOISE_THRESHOLD);
            assert_eq!(suite.capture_timeout_secs, 90);
            assert_eq!(suite.ready_timeout_secs, 60);
        }

        #[test]
        fn test_check_tolerance_overrides_suite() {
            let suite = SuiteConfig::from_yaml(SUITE).unwrap();
            let home = suite.checks[0].options(suite.tolerance).unwrap();
            let table = suite.checks[1].options(suite.tolerance).unwrap();
            assert_eq!(home.tolerance, 0.0);
            assert_eq!(table.tolerance, 0.5);
            assert_eq!(table.mask_regions, vec![Rect::new(0, 0, 200, 40)]);
        }

        #[test]
        fn test_rejects_empty_suite() {
            let err = SuiteConfig::from_yaml("checks: []\n").unwrap_err();
            assert!(err.to_string().contains("no checks"));
        }

        #[test]
        fn test_rejects_duplicate_names() {
            let yaml = "checks:\n  - {name: a, url: http://x/}\n  - {name: a, url: http://y/}\n";
            let err = SuiteConfig::from_yaml(yaml).unwrap_err();
            assert!(err.to_string().contains("duplicate"));
        }

        #[test]
        fn test_rejects_bad_mask() {
            let yaml = "checks:\n  - {name: a, url: http://x/, mask: [\"1,2,3\"]}\n";
            let err = SuiteConfig::from_yaml(yaml).unwrap_err();
            assert!(err.to_string().contains("bad mask"));
        }

        #[test]
        fn test_rejects_bad_tolerance() {
            let yaml = "checks:\n  - {name: a, url: http://x/, tolerance: 150}\n";
            assert!(SuiteConfig::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_ready_timeout_must_be_below_capture_timeout() {
            let yaml = "capture_timeout_secs: 30\nchecks:\n  - {name: a, url: http://x/}\n";
            let err = SuiteConfig::from_yaml(yaml).unwrap_err();
            assert!(err.to_string().contains("ready_timeout_secs"));

            let yaml = "capture_timeout_secs: 30\nready_timeout_secs: 20\nchecks:\n  - {name: a, url: http://x/}\n";
            let suite = SuiteConfig::from_yaml(yaml).unwrap();
            assert_eq!(suite.ready_timeout_secs, 20);
        }

        #[test]
        fn test_load_resolves_relative_dirs() {
            let tmp = tempfile::tempdir().unwrap();
            let path = tmp.path().join("suite.yaml");
            std::fs::write(&path, SUITE).unwrap();
            let suite = SuiteConfig::load(&path).unwrap();
            assert_eq!(suite.baseline_dir, tmp.path().join("baselines"));
            assert_eq!(suite.diff_dir, tmp.path().join("diffs"));
        }
    }
}

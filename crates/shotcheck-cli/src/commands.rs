//! CLI command definitions using clap

use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand, ValueEnum};
use shotcheck::{CaptureConfig, CompareOptions, Rect};
use std::path::PathBuf;
use std::time::Duration;

/// Shotcheck: visual regression checks against approved baseline images
#[derive(Parser, Debug)]
#[command(name = "shotcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two image files offline
    Diff(DiffArgs),

    /// Capture a page and compare it against its baseline
    Check(CheckArgs),

    /// Capture a page and store it as the baseline
    Approve(ApproveArgs),

    /// Run every check of a YAML suite
    Run(RunArgs),
}

/// Options shared by every comparison
#[derive(Args, Debug, Clone, Default)]
pub struct CompareArgs {
    /// Maximum allowed difference percentage
    #[arg(short, long, default_value = "0")]
    pub tolerance: f64,

    /// Region to blank in both images (repeatable)
    #[arg(long = "mask", value_name = "X,Y,W,H")]
    pub masks: Vec<Rect>,

    /// Per-pixel channel delta ignored as noise
    #[arg(long, default_value_t = shotcheck::DEFAULT_NOISE_THRESHOLD)]
    pub noise_threshold: u32,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl CompareArgs {
    /// Comparison options without an element scope
    #[must_use]
    pub fn options(&self) -> CompareOptions {
        self.masks
            .iter()
            .fold(CompareOptions::new().with_tolerance(self.tolerance), |o, r| {
                o.with_mask(*r)
            })
    }
}

/// Arguments for the diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Approved baseline image
    pub baseline: PathBuf,

    /// Candidate image
    pub candidate: PathBuf,

    /// Compare only this region of the candidate
    #[arg(long, value_name = "X,Y,W,H")]
    pub region: Option<Rect>,

    /// Write the diff overlay here when images differ
    #[arg(long)]
    pub diff_out: Option<PathBuf>,

    /// Comparison options
    #[command(flatten)]
    pub compare: CompareArgs,
}

/// Browser session options
#[derive(Args, Debug, Clone)]
pub struct BrowserArgs {
    /// Viewport width
    #[arg(long, default_value = "1280")]
    pub viewport_width: u32,

    /// Viewport height
    #[arg(long, default_value = "800")]
    pub viewport_height: u32,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chrome, Chromium or Edge executable
    #[arg(long, env = "SHOTCHECK_CHROME")]
    pub chrome: Option<PathBuf>,

    /// Seconds allowed for each capture
    #[arg(long, default_value = "90")]
    pub timeout: u64,

    /// Seconds to wait for the page to finish loading, kept below --timeout
    #[arg(long, default_value = "60")]
    pub ready_timeout: u64,
}

impl BrowserArgs {
    /// Capture configuration for these flags
    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        let mut config = CaptureConfig::new()
            .with_viewport(self.viewport_width, self.viewport_height)
            .with_headless(!self.headed)
            .with_ready_timeout(Duration::from_secs(self.ready_timeout))
            .within_capture_timeout(self.capture_timeout());
        if self.no_sandbox {
            config = config.with_no_sandbox();
        }
        if let Some(ref path) = self.chrome {
            config = config.with_executable(path.to_string_lossy());
        }
        config
    }

    /// Capture timeout
    #[must_use]
    pub const fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Page to capture
    #[arg(long)]
    pub url: String,

    /// Baseline name
    #[arg(long)]
    pub name: String,

    /// Scope the comparison to this element
    #[arg(long)]
    pub selector: Option<String>,

    /// Directory of baseline PNGs
    #[arg(long, default_value = "baselines")]
    pub baseline_dir: PathBuf,

    /// Directory diff overlays are written to
    #[arg(long, default_value = "diffs")]
    pub diff_dir: PathBuf,

    /// Comparison options
    #[command(flatten)]
    pub compare: CompareArgs,

    /// Browser options
    #[command(flatten)]
    pub browser: BrowserArgs,
}

impl CheckArgs {
    /// Comparison options including the element scope
    #[must_use]
    pub fn options(&self) -> CompareOptions {
        let options = self.compare.options();
        match self.selector {
            Some(ref s) => options.with_selector(s.clone()),
            None => options,
        }
    }
}

/// Arguments for the approve command
#[derive(Parser, Debug)]
pub struct ApproveArgs {
    /// Page to capture
    #[arg(long)]
    pub url: String,

    /// Baseline name
    #[arg(long)]
    pub name: String,

    /// Store only this element
    #[arg(long)]
    pub selector: Option<String>,

    /// Directory of baseline PNGs
    #[arg(long, default_value = "baselines")]
    pub baseline_dir: PathBuf,

    /// Browser options
    #[command(flatten)]
    pub browser: BrowserArgs,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite file (YAML)
    pub suite: PathBuf,

    /// Write the JSON report here
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Capture and approve every check instead of comparing
    #[arg(long)]
    pub approve: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers/CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chrome, Chromium or Edge executable
    #[arg(long, env = "SHOTCHECK_CHROME")]
    pub chrome: Option<PathBuf>,
}

/// Color choice argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

//! Shotcheck CLI: visual regression checks from the command line
//!
//! ## Usage
//!
//! ```bash
//! shotcheck diff baseline.png candidate.png --mask 0,0,200,40
//! shotcheck approve --url http://localhost:8080/ --name home
//! shotcheck check --url http://localhost:8080/ --name home --tolerance 0.5
//! shotcheck run suite.yaml --report target/shotcheck/report.json
//! ```

use clap::Parser;
use shotcheck::{Comparator, ComparisonResult, DiffEngine, MemoryBaselineStore, RasterBuffer};
use shotcheck_cli::{
    describe, init_logging, Cli, CliConfig, CliResult, ColorChoice, Commands, DiffArgs,
    OutputFormat, ProgressReporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether everything matched
fn run() -> CliResult<bool> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity);

    match cli.command {
        Commands::Diff(args) => run_diff(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Check(args) => live::run_check(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Approve(args) => live::run_approve(&config, &args),
        #[cfg(feature = "browser")]
        Commands::Run(args) => live::run_suite(&config, &args),
        #[cfg(not(feature = "browser"))]
        Commands::Check(_) | Commands::Approve(_) | Commands::Run(_) => Err(
            shotcheck_cli::CliError::config("live capture requires the `browser` feature"),
        ),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn reporter(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

/// Print one comparison in the requested format
fn emit(
    config: &CliConfig,
    format: OutputFormat,
    name: &str,
    result: &ComparisonResult,
) -> CliResult<()> {
    let summary = result.summary();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => {
            let line = describe(name, &summary);
            let reporter = reporter(config);
            if result.matches {
                reporter.success(&line);
            } else {
                reporter.failure(&line);
            }
        }
    }
    Ok(())
}

fn run_diff(config: &CliConfig, args: &DiffArgs) -> CliResult<bool> {
    let baseline = RasterBuffer::from_encoded(&std::fs::read(&args.baseline)?)?;
    let candidate = RasterBuffer::from_encoded(&std::fs::read(&args.candidate)?)?;

    let comparator = Comparator::new(MemoryBaselineStore::new())
        .with_engine(DiffEngine::new().with_noise_threshold(args.compare.noise_threshold));
    let options = args.compare.options();
    let result = match args.region {
        Some(region) => comparator.compare_buffers_in(&baseline, &candidate, region, &options)?,
        None => comparator.compare_buffers(&baseline, &candidate, &options)?,
    };

    if let (Some(path), Some(png)) = (&args.diff_out, result.diff_png()?) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, png)?;
    }

    let name = args
        .candidate
        .file_stem()
        .map_or_else(|| "candidate".to_string(), |s| s.to_string_lossy().into_owned());
    emit(config, args.compare.format, &name, &result)?;
    Ok(result.matches)
}

#[cfg(feature = "browser")]
mod live {
    use super::{emit, reporter};
    use shotcheck::{CaptureConfig, ChromiumCapture, Comparator, DiffEngine, FsBaselineStore};
    use shotcheck_cli::{
        write_diff, ApproveArgs, CheckArgs, CliConfig, CliError, CliResult, RunArgs, SuiteConfig,
        SuiteRunner,
    };
    use std::future::Future;
    use std::time::Duration;
    use tracing::warn;

    /// Run `work` on a fresh browser session, closing it on every path
    fn with_session<T, F, Fut>(config: CaptureConfig, work: F) -> CliResult<T>
    where
        F: FnOnce(ChromiumCapture) -> Fut,
        Fut: Future<Output = (ChromiumCapture, CliResult<T>)>,
    {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;

        rt.block_on(async {
            let session = ChromiumCapture::launch(config).await?;
            let (session, outcome) = work(session).await;
            if let Err(e) = session.close().await {
                warn!(error = %e, "browser did not close cleanly");
            }
            outcome
        })
    }

    pub fn run_check(config: &CliConfig, args: &CheckArgs) -> CliResult<bool> {
        let comparator = Comparator::new(FsBaselineStore::new(&args.baseline_dir))
            .with_engine(DiffEngine::new().with_noise_threshold(args.compare.noise_threshold))
            .with_capture_timeout(args.browser.capture_timeout());
        let options = args.options();

        let result = with_session(args.browser.capture_config(), |mut session| async move {
            let outcome = comparator
                .compare(&mut session, &args.name, &args.url, &options)
                .await
                .map_err(CliError::from);
            (session, outcome)
        })?;

        if !result.matches {
            if let Some(path) = write_diff(&args.diff_dir, &args.name, &result)? {
                reporter(config).info(&format!("diff written to {}", path.display()));
            }
        }
        emit(config, args.compare.format, &args.name, &result)?;
        Ok(result.matches)
    }

    pub fn run_approve(config: &CliConfig, args: &ApproveArgs) -> CliResult<bool> {
        let comparator = Comparator::new(FsBaselineStore::new(&args.baseline_dir))
            .with_capture_timeout(args.browser.capture_timeout());
        let mut options = shotcheck::CompareOptions::new();
        if let Some(ref selector) = args.selector {
            options = options.with_selector(selector.clone());
        }

        let approved = with_session(args.browser.capture_config(), |mut session| async move {
            let outcome = comparator
                .approve(&mut session, &args.name, &args.url, &options)
                .await
                .map_err(CliError::from);
            (session, outcome)
        })?;

        reporter(config).success(&format!(
            "{} approved ({}x{})",
            args.name,
            approved.width(),
            approved.height()
        ));
        Ok(true)
    }

    pub fn run_suite(config: &CliConfig, args: &RunArgs) -> CliResult<bool> {
        let suite = SuiteConfig::load(&args.suite)?;
        let mut capture = CaptureConfig::new()
            .with_viewport(suite.viewport.width, suite.viewport.height)
            .with_headless(!args.headed)
            .with_ready_timeout(Duration::from_secs(suite.ready_timeout_secs))
            .within_capture_timeout(Duration::from_secs(suite.capture_timeout_secs));
        if args.no_sandbox {
            capture = capture.with_no_sandbox();
        }
        if let Some(ref path) = args.chrome {
            capture = capture.with_executable(path.to_string_lossy());
        }

        let runner = SuiteRunner::new(suite);
        let mut progress = reporter(config);
        let report = with_session(capture, |mut session| async move {
            let report = runner.run(&mut session, &mut progress, args.approve).await;
            (session, Ok(report))
        })?;

        match args.report {
            Some(ref path) => {
                report.write_json(path)?;
                reporter(config).info(&format!("report written to {}", path.display()));
            }
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        }
        Ok(report.success())
    }
}

//! Shotcheck CLI Library
//!
//! Command-line interface for the Shotcheck visual regression engine.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
mod logging;
mod output;
mod runner;

pub use commands::{
    ApproveArgs, BrowserArgs, CheckArgs, Cli, ColorArg, Commands, CompareArgs, DiffArgs, RunArgs,
};
pub use config::{CheckSpec, CliConfig, ColorChoice, SuiteConfig, Verbosity, Viewport};
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use output::{describe, OutputFormat, ProgressReporter};
pub use runner::{write_diff, CheckReport, CheckStatus, SuiteReport, SuiteRunner};

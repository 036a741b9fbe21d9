//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].
//! Failures come back as [`miette::Report`] values and are rendered on
//! stderr with the fancy report handler, so diagnostic codes, causes, and
//! help text all survive to the terminal.

use clap::Parser;
use kigumi::{cli::Cli, runner};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

#[allow(clippy::print_stderr, reason = "failure reports belong on stderr")]
fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt().with_max_level(max_level).init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
    }
}

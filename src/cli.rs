//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands. The
//! `build` subcommand is the default when none is given.

use crate::manifest::DEFAULT_MANIFEST;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// A manifest-driven incremental build engine for native extension modules.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the build manifest file to use.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_MANIFEST)]
    pub file: Utf8PathBuf,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional subcommand to execute; defaults to `build` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Arguments accepted by the `build` command.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct BuildArgs {
    /// A list of specific targets to build; defaults to the `all` target.
    pub targets: Vec<String>,
}

/// Available top-level commands.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Build specified targets (or the `all` target if none are given).
    Build(BuildArgs),

    /// Remove every output file declared by the manifest.
    Clean,

    /// Display the build dependency graph in DOT format.
    Graph,
}

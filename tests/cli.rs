#![allow(
    clippy::expect_used,
    reason = "CLI tests use expect for descriptive failures"
)]

//! Unit tests for CLI argument parsing.

use assert_cmd::Command;
use clap::Parser;
use kigumi::cli::{Cli, Commands};
use predicates::prelude::*;
use rstest::rstest;

#[rstest]
#[case::default_invocation(vec!["kigumi"])]
#[case::build_targets(vec!["kigumi", "build", "all", "build/mod.so"])]
#[case::custom_file(vec!["kigumi", "--file", "Custom", "clean"])]
#[case::directory(vec!["kigumi", "-C", "subdir", "graph"])]
fn cli_parses(#[case] args: Vec<&str>) {
    Cli::try_parse_from(args).expect("arguments parse");
}

#[test]
fn build_is_not_the_parsed_default() {
    // The runner substitutes `build` when no subcommand is given.
    let cli = Cli::try_parse_from(["kigumi"]).expect("parse");
    assert!(cli.command.is_none());
}

#[test]
fn build_collects_targets() {
    let cli = Cli::try_parse_from(["kigumi", "build", "a", "b"]).expect("parse");
    match cli.command {
        Some(Commands::Build(args)) => assert_eq!(args.targets, ["a", "b"]),
        other => panic!("expected build command, got {other:?}"),
    }
}

#[test]
fn cli_help() {
    let mut cmd = Command::cargo_bin("kigumi").expect("binary exists");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = Command::cargo_bin("kigumi").expect("binary exists");
    cmd.arg("--no-such-flag").assert().failure();
}

#[test]
fn missing_manifest_fails_build() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = Command::cargo_bin("kigumi").expect("binary exists");
    cmd.current_dir(temp.path()).arg("build").assert().failure();
}

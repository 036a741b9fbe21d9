//! CLI execution and command dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! handles command execution. It loads the static manifest, registers every
//! generated-source, object, and link target plus the phony `all` target,
//! and drives the task graph.

use crate::cli::{BuildArgs, Cli, Commands};
use crate::codegen::CodeGenerator;
use crate::compile::{CompilationUnitBuilder, CompileFlags};
use crate::graph::{TaskGraph, TaskNode};
use crate::link::{LinkFlags, Linker};
use crate::manifest::{self, BuildManifest};
use crate::platform::PlatformInfo;
use camino::Utf8Path;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::io::Write as _;
use tracing::{debug, info};

/// Name of the phony target grouping the whole build.
pub const ALL_TARGET: &str = "all";

/// Execute the parsed [`Cli`] commands.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, the toolchain is
/// missing, or any build action fails.
pub fn run(cli: &Cli) -> Result<()> {
    if let Some(dir) = &cli.directory {
        std::env::set_current_dir(dir.as_std_path())
            .into_diagnostic()
            .wrap_err_with(|| format!("changing directory to {dir}"))?;
    }
    let command = cli
        .command
        .clone()
        .unwrap_or(Commands::Build(BuildArgs::default()));
    match command {
        Commands::Build(args) => handle_build(cli, &args),
        Commands::Clean => handle_clean(cli),
        Commands::Graph => handle_graph(cli),
    }
}

fn handle_build(cli: &Cli, args: &BuildArgs) -> Result<()> {
    let manifest = load_manifest(cli)?;
    // Toolchain preflight happens before any target is considered so a
    // missing binary is never interleaved with build errors.
    let platform = PlatformInfo::probe().wrap_err("resolving toolchain")?;
    let mut graph = register_targets(&manifest, &platform)?;

    let requested = if args.targets.is_empty() {
        vec![ALL_TARGET.to_owned()]
    } else {
        args.targets.clone()
    };
    for name in &requested {
        graph
            .build(Utf8Path::new(name))
            .wrap_err_with(|| format!("building target '{name}'"))?;
    }
    Ok(())
}

fn handle_clean(cli: &Cli) -> Result<()> {
    let manifest = load_manifest(cli)?;
    for path in manifest.output_paths() {
        match std::fs::remove_file(path.as_std_path()) {
            Ok(()) => info!(path = %path, "removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("removing {path}"));
            }
        }
    }
    Ok(())
}

fn handle_graph(cli: &Cli) -> Result<()> {
    let manifest = load_manifest(cli)?;
    let platform = PlatformInfo::probe().wrap_err("resolving toolchain")?;
    let graph = register_targets(&manifest, &platform)?;
    graph.check().wrap_err("validating task graph")?;
    std::io::stdout()
        .write_all(graph.to_dot().as_bytes())
        .into_diagnostic()
        .wrap_err("writing graph to stdout")?;
    Ok(())
}

fn load_manifest(cli: &Cli) -> Result<BuildManifest> {
    let manifest = manifest::from_path(&cli.file)
        .wrap_err_with(|| format!("loading manifest {}", cli.file))?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        let json = serde_json::to_string_pretty(&manifest)
            .into_diagnostic()
            .wrap_err("serialising manifest")?;
        debug!("manifest:\n{json}");
    }
    Ok(manifest)
}

/// Build the task graph from the static manifest.
///
/// Generated sources are registered first, then objects (whose declared
/// prerequisites may name generated outputs), then the link target, and
/// finally the phony `all` target grouping the module and any auxiliary
/// prerequisites.
///
/// # Errors
///
/// Returns an error if a flag string cannot be split or an output path is
/// claimed twice.
pub fn register_targets(manifest: &BuildManifest, platform: &PlatformInfo) -> Result<TaskGraph> {
    let extra_cxxflags = split_flags(&manifest.extra_cxxflags)?;
    let extra_ldflags = split_flags(&manifest.extra_ldflags)?;

    let mut graph = TaskGraph::new();
    for rule in &manifest.generated {
        let node = TaskNode::file(
            rule.output.clone(),
            vec![rule.template.clone(), rule.options.clone()],
            Box::new(CodeGenerator::new(
                rule.template.clone(),
                rule.options.clone(),
                rule.output.clone(),
            )),
        );
        graph.register(node)?;
    }

    for rule in &manifest.objects {
        let mut prerequisites = vec![rule.source.clone()];
        prerequisites.extend(rule.deps.iter().cloned());
        let flags = CompileFlags {
            include_paths: manifest.include_paths.clone(),
            optimize: manifest.optimize,
            sanitize: manifest.sanitize,
            extra: extra_cxxflags.clone(),
        };
        let node = TaskNode::file(
            rule.object.clone(),
            prerequisites,
            Box::new(CompilationUnitBuilder::new(
                platform,
                rule.source.clone(),
                rule.object.clone(),
                flags,
            )),
        );
        graph.register(node)?;
    }

    let objects: Vec<_> = manifest.objects.iter().map(|o| o.object.clone()).collect();
    let link_flags = LinkFlags {
        libraries: manifest.libraries.clone(),
        optimize: manifest.optimize,
        sanitize: manifest.sanitize,
        extra: extra_ldflags,
    };
    let node = TaskNode::file(
        manifest.module.clone(),
        objects.clone(),
        Box::new(Linker::new(
            platform,
            objects,
            manifest.module.clone(),
            link_flags,
        )),
    );
    graph.register(node)?;

    let mut all_deps = vec![manifest.module.clone()];
    all_deps.extend(manifest.auxiliary.iter().cloned());
    graph.register(TaskNode::phony(ALL_TARGET, all_deps))?;

    Ok(graph)
}

/// Split flag strings into individual arguments using shell quoting rules,
/// so a manifest entry like `"-g -Wall"` expands to two arguments.
fn split_flags(flags: &[String]) -> Result<Vec<String>> {
    let mut args = Vec::new();
    for flag in flags {
        let split =
            shlex::split(flag).ok_or_else(|| miette!("unbalanced quotes in flag '{flag}'"))?;
        args.extend(split);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        reason = "tests use expect for descriptive failures"
    )]

    use super::*;

    #[test]
    fn split_flags_expands_multi_token_strings() {
        let flags = vec!["-g -Wall".to_owned(), "-DNAME='a b'".to_owned()];
        let args = split_flags(&flags).expect("split");
        assert_eq!(args, ["-g", "-Wall", "-DNAME=a b"]);
    }

    #[test]
    fn split_flags_rejects_unbalanced_quotes() {
        assert!(split_flags(&["-DBAD='oops".to_owned()]).is_err());
    }

    #[test]
    fn register_targets_wires_the_whole_module() {
        let yaml = r"
module: build/mod_demo.so
generated:
  - output: src/Gen.cpp
    template: templates/Gen.cpp.j2
    options: config/opts.yml
objects:
  - object: build/Gen.o
    source: src/Gen.cpp
  - object: build/Main.o
    source: src/Main.cpp
include_paths: [src]
auxiliary: [build/support.bin]
";
        let manifest = manifest::from_str(yaml).expect("parse");
        let platform = fake_platform();
        let graph = register_targets(&manifest, &platform).expect("register");

        let outputs: Vec<_> = graph.outputs().map(Utf8Path::as_str).collect();
        assert_eq!(
            outputs,
            ["src/Gen.cpp", "build/Gen.o", "build/Main.o", "build/mod_demo.so"]
        );
        let all = graph.node(Utf8Path::new(ALL_TARGET)).expect("all target");
        assert_eq!(
            all.prerequisites(),
            [
                Utf8Path::new("build/mod_demo.so"),
                Utf8Path::new("build/support.bin")
            ]
        );
    }

    #[test]
    fn duplicate_outputs_in_manifest_are_rejected() {
        let yaml = r"
module: build/mod_demo.so
objects:
  - object: build/Dup.o
    source: src/A.cpp
  - object: build/Dup.o
    source: src/B.cpp
";
        let manifest = manifest::from_str(yaml).expect("parse");
        let platform = fake_platform();
        assert!(register_targets(&manifest, &platform).is_err());
    }

    fn fake_platform() -> PlatformInfo {
        PlatformInfo::with_compiler("fakecc".into())
    }
}

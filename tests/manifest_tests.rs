#![allow(
    clippy::expect_used,
    reason = "manifest tests use expect for descriptive failures"
)]

//! Unit tests for build manifest deserialisation.

use anyhow::{ensure, Result};
use kigumi::manifest;
use rstest::rstest;

#[rstest]
fn parse_full_manifest() -> Result<()> {
    let yaml = r#"
module: build/mod_demo.so
generated:
  - output: src/DemoConfig.cpp
    template: templates/DemoConfig.cpp.j2
    options: config/options.yml
objects:
  - object: build/Demo.o
    source: src/Demo.cpp
    deps: [src/DemoConfig.cpp]
  - object: build/Main.o
    source: src/Main.cpp
include_paths: [src, src/support]
libraries: ["-lstdc++"]
optimize: true
sanitize: false
extra_cxxflags: ["-g -Wall"]
auxiliary: [build/support.bin]
"#;
    let manifest = manifest::from_str(yaml)?;
    ensure!(manifest.module == "build/mod_demo.so");
    ensure!(manifest.objects.len() == 2);
    ensure!(manifest.generated.len() == 1);
    let first = &manifest.objects[0];
    ensure!(first.object == "build/Demo.o");
    ensure!(first.deps == ["src/DemoConfig.cpp"]);
    ensure!(manifest.optimize);
    ensure!(!manifest.sanitize);
    ensure!(manifest.auxiliary == ["build/support.bin"]);
    Ok(())
}

#[test]
fn optional_sections_default_to_empty() -> Result<()> {
    let manifest = manifest::from_str("module: build/mod.so\n")?;
    ensure!(manifest.objects.is_empty());
    ensure!(manifest.generated.is_empty());
    ensure!(manifest.libraries.is_empty());
    ensure!(!manifest.optimize);
    Ok(())
}

#[test]
fn missing_module_is_rejected() {
    let yaml = "objects:\n  - object: build/A.o\n    source: src/A.cpp\n";
    assert!(manifest::from_str(yaml).is_err());
}

#[test]
fn unknown_top_level_field_is_rejected() {
    let yaml = "module: build/mod.so\nsurprise: true\n";
    assert!(manifest::from_str(yaml).is_err());
}

#[test]
fn object_rule_requires_source() {
    let yaml = "module: build/mod.so\nobjects:\n  - object: build/A.o\n";
    assert!(manifest::from_str(yaml).is_err());
}

#[test]
fn from_path_reports_missing_file() {
    let err = manifest::from_path(camino::Utf8Path::new("/nonexistent/Kigumifile"))
        .expect_err("missing file");
    assert!(matches!(err, manifest::ManifestError::Read { .. }));
}

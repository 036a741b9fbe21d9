//! Build manifest structures and loading.
//!
//! This module defines the data structures used to represent a parsed
//! `Kigumifile`. The manifest is the static declaration of every target the
//! engine knows about: the generated-source table, the object table, the
//! library dependency list, and the final shared-library artefact. It is
//! deserialised with `serde-saphyr`, built once per invocation, and never
//! mutated afterwards.
//!
//! ```rust
//! use kigumi::manifest;
//!
//! let yaml = "module: build/mod_demo.so\nobjects:\n  - object: build/Demo.o\n    source: src/Demo.cpp";
//! let manifest = manifest::from_str(yaml).expect("parse");
//! assert_eq!(manifest.module, "build/mod_demo.so");
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// Default manifest file name looked up in the working directory.
pub const DEFAULT_MANIFEST: &str = "Kigumifile";

/// Top-level manifest structure parsed from a `Kigumifile`.
///
/// Each field mirrors a key in the YAML manifest. Optional collections
/// default to empty to simplify deserialisation.
///
/// ```yaml
/// module: build/mod_demo.so
/// generated:
///   - output: src/DemoConfig.cpp
///     template: templates/DemoConfig.cpp.j2
///     options: config/options.yml
/// objects:
///   - object: build/Demo.o
///     source: src/Demo.cpp
///     deps: [src/DemoConfig.cpp]
/// include_paths: [src]
/// libraries: ["-lstdc++"]
/// ```
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuildManifest {
    /// Path of the final shared-library artefact.
    pub module: Utf8PathBuf,

    /// Compilation units, each producing one object file.
    #[serde(default)]
    pub objects: Vec<ObjectRule>,

    /// Template-generated sources, rendered before compilation.
    #[serde(default)]
    pub generated: Vec<GeneratedRule>,

    /// Include directories passed to every compilation unit.
    #[serde(default)]
    pub include_paths: Vec<Utf8PathBuf>,

    /// Library archives and link arguments for the final link step.
    #[serde(default)]
    pub libraries: Vec<String>,

    /// Enable optimised compilation and linking.
    #[serde(default)]
    pub optimize: bool,

    /// Enable sanitizer instrumentation.
    #[serde(default)]
    pub sanitize: bool,

    /// Extra compiler flag strings appended to every compilation unit.
    #[serde(default)]
    pub extra_cxxflags: Vec<String>,

    /// Extra linker flag strings appended to the link step.
    #[serde(default)]
    pub extra_ldflags: Vec<String>,

    /// Additional prerequisites of the phony `all` target, such as a
    /// separately built native-support component.
    #[serde(default)]
    pub auxiliary: Vec<Utf8PathBuf>,
}

impl BuildManifest {
    /// Every output path the manifest declares, in declaration order:
    /// generated sources first, then objects, then the module artefact.
    pub fn output_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.generated
            .iter()
            .map(|rule| rule.output.as_path())
            .chain(self.objects.iter().map(|rule| rule.object.as_path()))
            .chain(std::iter::once(self.module.as_path()))
    }
}

/// One compilation unit: a single source file compiled to one object file.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectRule {
    /// Object file produced by this unit.
    pub object: Utf8PathBuf,
    /// Source file compiled by this unit. May name a generated output.
    pub source: Utf8PathBuf,
    /// Extra prerequisites, e.g. generated headers the unit includes.
    #[serde(default)]
    pub deps: Vec<Utf8PathBuf>,
}

/// One generated source: a template rendered against an option schema.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratedRule {
    /// Rendered file written by the generator.
    pub output: Utf8PathBuf,
    /// Template definition read by the generator.
    pub template: Utf8PathBuf,
    /// Configuration-option schema the template is rendered against.
    pub options: Utf8PathBuf,
}

/// Errors raised while loading a manifest.
#[derive(Debug, Error, Diagnostic)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest at {path}")]
    #[diagnostic(code(kigumi::manifest::read))]
    Read {
        /// Path that was attempted.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The manifest file is not valid YAML for the expected schema.
    #[error("failed to parse manifest {name}: {message}")]
    #[diagnostic(code(kigumi::manifest::parse))]
    Parse {
        /// Display name of the manifest source.
        name: String,
        /// Parser diagnostic text.
        message: String,
    },
}

/// Parse a manifest from a YAML string.
///
/// # Errors
///
/// Returns [`ManifestError::Parse`] if the YAML is invalid or does not match
/// the manifest schema.
pub fn from_str(yaml: &str) -> Result<BuildManifest, ManifestError> {
    from_str_named(yaml, "<string>")
}

/// Load and parse the manifest at `path`.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] if the file cannot be read and
/// [`ManifestError::Parse`] if its contents are invalid.
pub fn from_path(path: &Utf8Path) -> Result<BuildManifest, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_owned(),
        source,
    })?;
    from_str_named(&text, path.as_str())
}

fn from_str_named(yaml: &str, name: &str) -> Result<BuildManifest, ManifestError> {
    serde_saphyr::from_str(yaml).map_err(|e| ManifestError::Parse {
        name: name.to_owned(),
        message: e.to_string(),
    })
}

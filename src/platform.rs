//! Toolchain discovery and platform-specific flag sets.
//!
//! [`PlatformInfo`] resolves the native compiler driver once, up front, and
//! supplies the flag strings the compile and link steps need. Resolution is a
//! pure lookup: a missing binary is a [`PreflightError`] reported before any
//! build action runs, never interleaved with compile or link failures.

use camino::{Utf8Path, Utf8PathBuf};
use miette::Diagnostic;
use std::env;
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding the compiler driver.
pub const CXX_ENV: &str = "CXX";

/// Compiler driver used when [`CXX_ENV`] is unset.
pub const DEFAULT_COMPILER: &str = "c++";

/// Errors raised while probing the toolchain.
#[derive(Debug, Error, Diagnostic)]
pub enum PreflightError {
    /// A required toolchain binary could not be located.
    #[error("required tool '{name}' was not found on PATH")]
    #[diagnostic(
        code(kigumi::platform::tool_not_found),
        help("install a C++ toolchain or point the CXX environment variable at one")
    )]
    ToolNotFound {
        /// Name of the binary that was looked up.
        name: String,
    },
}

/// Resolved toolchain paths and platform flag sets.
///
/// The same driver binary is used for compiling and linking; the flag sets
/// differ per step.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    cxx: Utf8PathBuf,
}

impl PlatformInfo {
    /// Locate the toolchain binaries, honouring the `CXX` override.
    ///
    /// # Errors
    ///
    /// Returns [`PreflightError::ToolNotFound`] when the compiler driver is
    /// missing or not executable.
    pub fn probe() -> Result<Self, PreflightError> {
        let requested = env::var(CXX_ENV).unwrap_or_else(|_| DEFAULT_COMPILER.to_owned());
        let cxx = resolve_tool(&requested)
            .ok_or_else(|| PreflightError::ToolNotFound { name: requested })?;
        debug!(compiler = %cxx, "resolved toolchain");
        Ok(Self { cxx })
    }

    /// Build a `PlatformInfo` around an explicit driver path, bypassing
    /// PATH resolution.
    #[cfg(test)]
    pub(crate) fn with_compiler(cxx: Utf8PathBuf) -> Self {
        Self { cxx }
    }

    /// Path of the compiler driver.
    #[must_use]
    pub fn compiler(&self) -> &Utf8Path {
        &self.cxx
    }

    /// Path of the linker driver.
    #[must_use]
    pub fn linker(&self) -> &Utf8Path {
        &self.cxx
    }

    /// Flags required to compile objects destined for a shared module.
    #[must_use]
    pub fn module_cxxflags(&self) -> Vec<String> {
        vec!["-fPIC".to_owned()]
    }

    /// Flags required to link a shared module.
    #[must_use]
    pub fn module_ldflags(&self) -> Vec<String> {
        #[cfg(target_os = "macos")]
        {
            vec!["-dynamiclib".to_owned()]
        }
        #[cfg(not(target_os = "macos"))]
        {
            vec!["-shared".to_owned()]
        }
    }

    /// Portability link flags that vary per host platform.
    #[must_use]
    pub fn portability_ldflags(&self) -> Vec<String> {
        #[cfg(target_os = "macos")]
        {
            vec!["-undefined".to_owned(), "dynamic_lookup".to_owned()]
        }
        #[cfg(not(target_os = "macos"))]
        {
            Vec::new()
        }
    }
}

/// Resolve a tool name to an executable path.
///
/// A name containing a path separator is checked directly; a bare name is
/// searched for in every `PATH` entry in order. Returns `None` when nothing
/// executable matches.
#[must_use]
pub fn resolve_tool(name: &str) -> Option<Utf8PathBuf> {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        let candidate = Utf8Path::new(name);
        return is_executable(candidate).then(|| candidate.to_owned());
    }
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let Ok(dir) = Utf8PathBuf::from_path_buf(dir) else {
            continue;
        };
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Utf8Path) -> bool {
    std::fs::metadata(path.as_std_path())
        .is_ok_and(|metadata| metadata.is_file() && has_execute_permission(&metadata))
}

#[cfg(unix)]
fn has_execute_permission(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_permission(metadata: &std::fs::Metadata) -> bool {
    metadata.is_file()
}

//! Native compiler invocation for single compilation units.
//!
//! A [`CompilationUnitBuilder`] shells out to the resolved compiler driver,
//! turning exactly one source file into one object file. The engine does not
//! parse or repair compiler diagnostics; on a non-zero exit the captured
//! stderr is carried verbatim inside the error.

use crate::action::{render_command, Action, ActionError};
use crate::platform::PlatformInfo;
use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::fs;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Unit-specific flag set for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileFlags {
    /// Include directories, each emitted as `-I<dir>`.
    pub include_paths: Vec<Utf8PathBuf>,
    /// Enable optimisation (`-O2`).
    pub optimize: bool,
    /// Enable sanitizer instrumentation (`-fsanitize=address`).
    pub sanitize: bool,
    /// Additional pre-split compiler arguments.
    pub extra: Vec<String>,
}

impl CompileFlags {
    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for dir in &self.include_paths {
            args.push(format!("-I{dir}"));
        }
        if self.optimize {
            args.push("-O2".to_owned());
        }
        if self.sanitize {
            args.push("-fsanitize=address".to_owned());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

/// Errors raised while compiling one unit.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    /// The object's parent directory could not be created.
    #[error("failed to create output directory {path}")]
    #[diagnostic(code(kigumi::compile::create_dir))]
    CreateDir {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The compiler process could not be started.
    #[error("failed to run compiler {program}")]
    #[diagnostic(code(kigumi::compile::spawn))]
    Spawn {
        /// Compiler path.
        program: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The compiler exited with a non-zero status.
    #[error("compiling {source_path} failed ({status}):\n{diagnostics}")]
    #[diagnostic(code(kigumi::compile::failed))]
    CompilerFailed {
        /// Source file being compiled.
        source_path: Utf8PathBuf,
        /// Compiler exit status.
        status: std::process::ExitStatus,
        /// Captured compiler stderr.
        diagnostics: String,
    },
}

/// Compiles one source file into one object file.
#[derive(Debug)]
pub struct CompilationUnitBuilder {
    compiler: Utf8PathBuf,
    base_flags: Vec<String>,
    source: Utf8PathBuf,
    object: Utf8PathBuf,
    flags: CompileFlags,
}

impl CompilationUnitBuilder {
    /// Create a builder for one source/object pair.
    #[must_use]
    pub fn new(
        platform: &PlatformInfo,
        source: Utf8PathBuf,
        object: Utf8PathBuf,
        flags: CompileFlags,
    ) -> Self {
        Self {
            compiler: platform.compiler().to_owned(),
            base_flags: platform.module_cxxflags(),
            source,
            object,
            flags,
        }
    }

    /// Invoke the compiler, producing the object file.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] if the process cannot be spawned or exits
    /// non-zero.
    pub fn compile(&self) -> Result<(), CompileError> {
        if let Some(parent) = self.object.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path()).map_err(|source| CompileError::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
        }

        let mut args = self.base_flags.clone();
        args.extend(self.flags.to_args());
        args.push("-c".to_owned());
        args.push(self.source.as_str().to_owned());
        args.push("-o".to_owned());
        args.push(self.object.as_str().to_owned());

        info!("Running command: {}", render_command(&self.compiler, &args));
        let output = Command::new(self.compiler.as_std_path())
            .args(&args)
            .output()
            .map_err(|source| CompileError::Spawn {
                program: self.compiler.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(CompileError::CompilerFailed {
                source_path: self.source.clone(),
                status: output.status,
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl Action for CompilationUnitBuilder {
    fn describe(&self) -> String {
        format!("compile {}", self.source)
    }

    fn execute(&self) -> Result<(), ActionError> {
        self.compile().map_err(ActionError::from)
    }
}

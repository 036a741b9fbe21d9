//! Final link step producing the shared-library artefact.
//!
//! A [`Linker`] combines the object files and library references into one
//! shared library. The toolchain is resolved before the graph runs (see
//! [`crate::platform::PlatformInfo::probe`]), so by the time a `Linker`
//! executes, a missing binary has already been reported as a preflight
//! failure rather than a link failure.

use crate::action::{render_command, Action, ActionError};
use crate::platform::PlatformInfo;
use camino::Utf8PathBuf;
use miette::Diagnostic;
use std::fs;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Flag set for the link step.
#[derive(Debug, Clone, Default)]
pub struct LinkFlags {
    /// Library archives and raw link arguments, passed through in order.
    pub libraries: Vec<String>,
    /// Enable optimised linking (`-O2`).
    pub optimize: bool,
    /// Enable sanitizer runtime linking.
    pub sanitize: bool,
    /// Additional pre-split linker arguments.
    pub extra: Vec<String>,
}

impl LinkFlags {
    fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.optimize {
            args.push("-O2".to_owned());
        }
        if self.sanitize {
            args.push("-fsanitize=address".to_owned());
            args.push("-shared-libasan".to_owned());
        }
        args.extend(self.extra.iter().cloned());
        args
    }
}

/// Errors raised while linking the module.
#[derive(Debug, Error, Diagnostic)]
pub enum LinkError {
    /// The artefact's parent directory could not be created.
    #[error("failed to create output directory {path}")]
    #[diagnostic(code(kigumi::link::create_dir))]
    CreateDir {
        /// Directory path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The linker process could not be started.
    #[error("failed to run linker {program}")]
    #[diagnostic(code(kigumi::link::spawn))]
    Spawn {
        /// Linker path.
        program: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The linker exited with a non-zero status.
    #[error("linking {output} failed ({status}):\n{diagnostics}")]
    #[diagnostic(code(kigumi::link::failed))]
    LinkerFailed {
        /// Artefact being linked.
        output: Utf8PathBuf,
        /// Linker exit status.
        status: std::process::ExitStatus,
        /// Captured linker stderr.
        diagnostics: String,
    },
}

/// Links object files and libraries into the shared-library artefact.
#[derive(Debug)]
pub struct Linker {
    linker: Utf8PathBuf,
    base_flags: Vec<String>,
    objects: Vec<Utf8PathBuf>,
    output: Utf8PathBuf,
    flags: LinkFlags,
}

impl Linker {
    /// Create a linker for the given objects and output artefact.
    #[must_use]
    pub fn new(
        platform: &PlatformInfo,
        objects: Vec<Utf8PathBuf>,
        output: Utf8PathBuf,
        flags: LinkFlags,
    ) -> Self {
        let mut base_flags = platform.module_ldflags();
        base_flags.extend(platform.portability_ldflags());
        Self {
            linker: platform.linker().to_owned(),
            base_flags,
            objects,
            output,
            flags,
        }
    }

    /// Invoke the linker, producing the shared library.
    ///
    /// # Errors
    ///
    /// Returns a [`LinkError`] if the process cannot be spawned or exits
    /// non-zero.
    pub fn link(&self) -> Result<(), LinkError> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path()).map_err(|source| LinkError::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
        }

        let mut args = self.base_flags.clone();
        args.extend(self.flags.to_args());
        args.extend(self.objects.iter().map(|o| o.as_str().to_owned()));
        args.push("-o".to_owned());
        args.push(self.output.as_str().to_owned());
        args.extend(self.flags.libraries.iter().cloned());

        info!("Running command: {}", render_command(&self.linker, &args));
        let output = Command::new(self.linker.as_std_path())
            .args(&args)
            .output()
            .map_err(|source| LinkError::Spawn {
                program: self.linker.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(LinkError::LinkerFailed {
                output: self.output.clone(),
                status: output.status,
                diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl Action for Linker {
    fn describe(&self) -> String {
        format!("link {}", self.output)
    }

    fn execute(&self) -> Result<(), ActionError> {
        self.link().map_err(ActionError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_adds_shared_runtime_flags() {
        let flags = LinkFlags {
            sanitize: true,
            ..LinkFlags::default()
        };
        assert_eq!(flags.to_args(), ["-fsanitize=address", "-shared-libasan"]);
    }
}

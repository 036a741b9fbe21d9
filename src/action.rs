//! Build actions invoked by the task graph.
//!
//! Each file target carries one strategy object implementing [`Action`]; the
//! graph invokes it polymorphically when the target is stale. The concrete
//! actions are [`crate::codegen::CodeGenerator`],
//! [`crate::compile::CompilationUnitBuilder`], and [`crate::link::Linker`].

use crate::codegen::RenderError;
use crate::compile::CompileError;
use crate::link::LinkError;
use camino::Utf8Path;
use miette::Diagnostic;
use thiserror::Error;

/// The operation that produces one target's output.
///
/// Actions are immutable once constructed: every path and flag they need is
/// captured at graph-registration time, so `execute` takes no arguments.
pub trait Action: std::fmt::Debug {
    /// Short human-readable description used in progress logging.
    fn describe(&self) -> String;

    /// Produce the target's output.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] describing the underlying generate,
    /// compile, or link failure.
    fn execute(&self) -> Result<(), ActionError>;
}

/// Failure of a single build action.
#[derive(Debug, Error, Diagnostic)]
pub enum ActionError {
    /// Template rendering failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Render(#[from] RenderError),

    /// Compiler invocation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    /// Linker invocation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Link(#[from] LinkError),
}

/// Render a program invocation as a single shell-quoted line for logging.
pub(crate) fn render_command(program: &Utf8Path, args: &[String]) -> String {
    let mut parts = vec![program.as_str()];
    parts.extend(args.iter().map(String::as_str));
    shlex::try_join(parts.iter().copied()).unwrap_or_else(|_| parts.join(" "))
}

//! Template-driven source generation.
//!
//! A [`CodeGenerator`] renders a `MiniJinja` template against a
//! configuration-option schema (a YAML document whose top-level keys become
//! template variables). Rendering is deterministic: identical template and
//! schema inputs always produce byte-identical output, which the
//! timestamp-based staleness model depends on. The output is rendered fully
//! in memory and written in a single operation, so a render failure never
//! leaves a partially written file behind.

use crate::action::{Action, ActionError};
use camino::Utf8PathBuf;
use miette::Diagnostic;
use minijinja::{Environment, UndefinedBehavior};
use std::fs;
use thiserror::Error;
use tracing::info;

/// Errors raised while generating a source file.
#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    /// The template file could not be read.
    #[error("failed to read template {path}")]
    #[diagnostic(code(kigumi::codegen::read_template))]
    ReadTemplate {
        /// Template path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The option schema file could not be read.
    #[error("failed to read option schema {path}")]
    #[diagnostic(code(kigumi::codegen::read_options))]
    ReadOptions {
        /// Schema path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The option schema is not valid YAML.
    #[error("failed to parse option schema {path}: {message}")]
    #[diagnostic(code(kigumi::codegen::parse_options))]
    OptionsParse {
        /// Schema path.
        path: Utf8PathBuf,
        /// Parser diagnostic text.
        message: String,
    },

    /// The template is syntactically invalid or references an absent field.
    #[error("failed to render template {template}")]
    #[diagnostic(code(kigumi::codegen::render))]
    Template {
        /// Template path.
        template: Utf8PathBuf,
        /// Underlying template engine failure.
        #[source]
        source: minijinja::Error,
    },

    /// The rendered output could not be written.
    #[error("failed to write generated source {path}")]
    #[diagnostic(code(kigumi::codegen::write))]
    WriteOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Renders one template definition into one generated source or header file.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    template: Utf8PathBuf,
    options: Utf8PathBuf,
    output: Utf8PathBuf,
}

impl CodeGenerator {
    /// Create a generator for one template/schema/output triple.
    #[must_use]
    pub fn new(template: Utf8PathBuf, options: Utf8PathBuf, output: Utf8PathBuf) -> Self {
        Self {
            template,
            options,
            output,
        }
    }

    /// Render the template fully in memory.
    ///
    /// Undefined template variables are strict errors: a template that
    /// references a field absent from the option schema fails instead of
    /// silently emitting empty text.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if an input cannot be read or the template
    /// fails to render.
    pub fn render(&self) -> Result<String, RenderError> {
        let template_src =
            fs::read_to_string(self.template.as_std_path()).map_err(|source| {
                RenderError::ReadTemplate {
                    path: self.template.clone(),
                    source,
                }
            })?;
        let options_src =
            fs::read_to_string(self.options.as_std_path()).map_err(|source| {
                RenderError::ReadOptions {
                    path: self.options.clone(),
                    source,
                }
            })?;
        let options_doc: serde_json::Value =
            serde_saphyr::from_str(&options_src).map_err(|e| RenderError::OptionsParse {
                path: self.options.clone(),
                message: e.to_string(),
            })?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.render_str(&template_src, &options_doc)
            .map_err(|source| RenderError::Template {
                template: self.template.clone(),
                source,
            })
    }

    /// Render the template and write the result to the output path.
    ///
    /// Parent directories are created as needed. The write happens only
    /// after a complete successful render.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] on any read, render, or write failure.
    pub fn generate(&self) -> Result<(), RenderError> {
        let rendered = self.render()?;
        if let Some(parent) = self.output.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path()).map_err(|source| {
                RenderError::WriteOutput {
                    path: self.output.clone(),
                    source,
                }
            })?;
        }
        fs::write(self.output.as_std_path(), rendered).map_err(|source| {
            RenderError::WriteOutput {
                path: self.output.clone(),
                source,
            }
        })?;
        info!(output = %self.output, "generated source from {}", self.template);
        Ok(())
    }
}

impl Action for CodeGenerator {
    fn describe(&self) -> String {
        format!("generate {}", self.output)
    }

    fn execute(&self) -> Result<(), ActionError> {
        self.generate().map_err(ActionError::from)
    }
}

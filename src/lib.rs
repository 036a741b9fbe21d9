//! Kigumi core library.
//!
//! Kigumi is a small incremental build engine for native extension modules.
//! A YAML manifest declares template-generated sources, compilation units,
//! and a final shared-library artefact; the task graph rebuilds only the
//! targets whose inputs changed.

pub mod action;
pub mod cli;
pub mod codegen;
pub mod compile;
pub mod graph;
pub mod link;
pub mod manifest;
pub mod platform;
pub mod runner;
pub mod stale;

//! The dependency-tracking task graph.
//!
//! A [`TaskGraph`] holds every registered [`TaskNode`] plus its prerequisite
//! edges and executes them depth-first: prerequisites first, in declaration
//! order, each action at most once per run, and only when the
//! [`crate::stale::StalenessChecker`] says the target's output is out of
//! date. Cycles and dangling prerequisites are configuration errors detected
//! before any action runs.

use crate::action::{Action, ActionError};
use crate::stale::StalenessChecker;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while registering or executing the graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// Two targets claimed the same output path.
    #[error("duplicate target: output {output} is already claimed")]
    #[diagnostic(code(kigumi::graph::duplicate_target))]
    DuplicateTarget {
        /// The contested output path.
        output: Utf8PathBuf,
    },

    /// A prerequisite names neither a registered target nor a file on disk.
    #[error("target {target} depends on {prerequisite}, which is neither a registered target nor an existing file")]
    #[diagnostic(code(kigumi::graph::dangling_prerequisite))]
    DanglingPrerequisite {
        /// The target declaring the prerequisite.
        target: Utf8PathBuf,
        /// The prerequisite that could not be resolved.
        prerequisite: Utf8PathBuf,
    },

    /// The prerequisite relation contains a cycle.
    #[error("dependency cycle detected: {}", fmt_chain(.cycle))]
    #[diagnostic(code(kigumi::graph::cycle))]
    CircularDependency {
        /// The cycle's target chain, first node repeated at the end.
        cycle: Vec<Utf8PathBuf>,
    },

    /// A target's action failed.
    #[error("building target {target} failed")]
    #[diagnostic(code(kigumi::graph::action_failed))]
    ActionFailed {
        /// The target whose action failed.
        target: Utf8PathBuf,
        /// The underlying action failure.
        #[source]
        #[diagnostic_source]
        source: ActionError,
    },

    /// File metadata could not be read during staleness checking.
    #[error("failed to stat {path}")]
    #[diagnostic(code(kigumi::graph::metadata))]
    Metadata {
        /// Path being inspected.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// `build` was asked for a target that was never registered.
    #[error("unknown target '{name}'")]
    #[diagnostic(code(kigumi::graph::unknown_target))]
    UnknownTarget {
        /// The requested target name.
        name: Utf8PathBuf,
    },
}

fn fmt_chain(chain: &[Utf8PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Rotate a detected cycle so its smallest member leads, then close the
/// loop by repeating that member. Keeps cycle reports stable regardless of
/// which target the walk entered through.
fn canonical_cycle(members: &[&Utf8Path]) -> Vec<Utf8PathBuf> {
    let lead = members
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    members[lead..]
        .iter()
        .chain(&members[..lead])
        .chain(std::iter::once(&members[lead]))
        .map(|member| member.to_path_buf())
        .collect()
}

/// A named build unit: either a file target producing one output, or a
/// phony grouping target with no output file.
#[derive(Debug)]
pub struct TaskNode {
    id: Utf8PathBuf,
    prerequisites: Vec<Utf8PathBuf>,
    action: Option<Box<dyn Action>>,
    phony: bool,
    built: bool,
}

impl TaskNode {
    /// A file target: `output` is produced from `prerequisites` by `action`.
    #[must_use]
    pub fn file(
        output: impl Into<Utf8PathBuf>,
        prerequisites: Vec<Utf8PathBuf>,
        action: Box<dyn Action>,
    ) -> Self {
        Self {
            id: output.into(),
            prerequisites,
            action: Some(action),
            phony: false,
            built: false,
        }
    }

    /// A phony target: a symbolic name grouping other targets.
    #[must_use]
    pub fn phony(name: impl Into<Utf8PathBuf>, prerequisites: Vec<Utf8PathBuf>) -> Self {
        Self {
            id: name.into(),
            prerequisites,
            action: None,
            phony: true,
            built: false,
        }
    }

    /// The target's identity: its output path, or its symbolic name.
    #[must_use]
    pub fn id(&self) -> &Utf8Path {
        &self.id
    }

    /// Prerequisites in declaration order.
    #[must_use]
    pub fn prerequisites(&self) -> &[Utf8PathBuf] {
        &self.prerequisites
    }

    /// Whether this target has no output file.
    #[must_use]
    pub fn is_phony(&self) -> bool {
        self.phony
    }
}

/// The set of registered targets and their prerequisite edges.
#[derive(Debug, Default)]
pub struct TaskGraph {
    nodes: IndexMap<Utf8PathBuf, TaskNode>,
}

impl TaskGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateTarget`] if the node's output path is
    /// already claimed by another registered target.
    pub fn register(&mut self, node: TaskNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(node.id()) {
            return Err(GraphError::DuplicateTarget {
                output: node.id().to_owned(),
            });
        }
        self.nodes.insert(node.id().to_owned(), node);
        Ok(())
    }

    /// Look up a registered target.
    #[must_use]
    pub fn node(&self, id: &Utf8Path) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    /// Output paths of every registered file target, in registration order.
    pub fn outputs(&self) -> impl Iterator<Item = &Utf8Path> {
        self.nodes
            .values()
            .filter(|node| !node.is_phony())
            .map(TaskNode::id)
    }

    /// Validate the graph configuration without running any action.
    ///
    /// Walks every target depth-first and stops at the first problem
    /// found, so configuration errors always surface before execution.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::CircularDependency`] if the prerequisite
    /// relation has a cycle, or [`GraphError::DanglingPrerequisite`] if a
    /// prerequisite names neither a registered target nor an existing file.
    pub fn check(&self) -> Result<(), GraphError> {
        let mut cleared = IndexSet::new();
        let mut trail = Vec::new();
        for id in self.nodes.keys() {
            self.validate(id, &mut trail, &mut cleared)?;
        }
        Ok(())
    }

    /// Depth-first validation walk. `trail` holds the chain of targets
    /// currently being expanded; meeting one of them again closes a cycle.
    /// Targets in `cleared` have already been validated on an earlier
    /// branch and are skipped.
    fn validate<'a>(
        &'a self,
        id: &'a Utf8Path,
        trail: &mut Vec<&'a Utf8Path>,
        cleared: &mut IndexSet<&'a Utf8Path>,
    ) -> Result<(), GraphError> {
        if cleared.contains(id) {
            return Ok(());
        }
        if let Some(entered) = trail.iter().position(|seen| *seen == id) {
            return Err(GraphError::CircularDependency {
                cycle: canonical_cycle(&trail[entered..]),
            });
        }
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        trail.push(id);
        for prereq in node.prerequisites() {
            if self.nodes.contains_key(prereq.as_path()) {
                self.validate(prereq, trail, cleared)?;
            } else if !prereq.as_std_path().exists() {
                return Err(GraphError::DanglingPrerequisite {
                    target: id.to_owned(),
                    prerequisite: prereq.clone(),
                });
            }
        }
        trail.pop();
        cleared.insert(id);
        Ok(())
    }

    /// Build a target and everything it depends on.
    ///
    /// Prerequisites are built first, in declaration order; the first
    /// failure aborts the whole call chain. Each target's action runs at
    /// most once per run, and only when the target is stale.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] for configuration problems (unknown target,
    /// cycle, dangling prerequisite) or the first failing action.
    pub fn build(&mut self, id: &Utf8Path) -> Result<(), GraphError> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::UnknownTarget { name: id.to_owned() });
        }
        self.check()?;
        self.build_node(id)
    }

    fn build_node(&mut self, id: &Utf8Path) -> Result<(), GraphError> {
        let (built, prerequisites) = match self.nodes.get(id) {
            Some(node) => (node.built, node.prerequisites.clone()),
            None => {
                return Err(GraphError::UnknownTarget { name: id.to_owned() });
            }
        };
        if built {
            return Ok(());
        }

        for prereq in &prerequisites {
            // Plain file prerequisites were validated by `check`; only
            // registered targets need building.
            if self.nodes.contains_key(prereq.as_path()) {
                self.build_node(prereq)?;
            }
        }

        let stale = StalenessChecker::new(self).is_stale(id)?;
        if stale {
            if let Some(action) = self.nodes.get(id).and_then(|node| node.action.as_deref()) {
                info!("{}", action.describe());
                action
                    .execute()
                    .map_err(|source| GraphError::ActionFailed {
                        target: id.to_owned(),
                        source,
                    })?;
            }
        } else {
            debug!(target_path = %id, "up to date");
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.built = true;
        }
        Ok(())
    }

    /// Render the graph in DOT format for visualisation.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph kigumi {\n");
        for node in self.nodes.values() {
            if node.is_phony() {
                let _ = writeln!(dot, "  \"{}\" [shape=ellipse];", node.id());
            } else {
                let _ = writeln!(dot, "  \"{}\" [shape=box];", node.id());
            }
            for prereq in node.prerequisites() {
                let _ = writeln!(dot, "  \"{}\" -> \"{}\";", node.id(), prereq);
            }
        }
        dot.push_str("}\n");
        dot
    }
}

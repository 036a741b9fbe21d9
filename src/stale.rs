//! Staleness decisions for build targets.
//!
//! A file target is stale when its output is missing, when any prerequisite
//! is itself stale, or when any prerequisite's modification time is strictly
//! newer than the output's. Phony targets always need evaluation. Plain file
//! prerequisites (inputs that are not targets) are never stale by
//! themselves; only their timestamps matter.
//!
//! Known gap carried over from the behaviour this engine models: flag
//! changes are not a staleness signal. Toggling an optimisation switch does
//! not rebuild objects whose timestamps are still current.

use crate::graph::{GraphError, TaskGraph};
use camino::Utf8Path;
use std::fs;
use std::time::SystemTime;

/// Decides whether a target must be (re)built.
pub struct StalenessChecker<'a> {
    graph: &'a TaskGraph,
}

impl<'a> StalenessChecker<'a> {
    /// Create a checker over the given graph.
    #[must_use]
    pub fn new(graph: &'a TaskGraph) -> Self {
        Self { graph }
    }

    /// Whether the target identified by `id` must be rebuilt.
    ///
    /// Paths that do not name a registered target are treated as plain
    /// input files and are never stale by themselves.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DanglingPrerequisite`] when a prerequisite
    /// resolves to neither a registered target nor an existing file, and
    /// [`GraphError::Metadata`] when file metadata cannot be read.
    pub fn is_stale(&self, id: &Utf8Path) -> Result<bool, GraphError> {
        let Some(node) = self.graph.node(id) else {
            return Ok(false);
        };
        if node.is_phony() {
            return Ok(true);
        }
        let Some(output_mtime) = modified_at(id)? else {
            return Ok(true);
        };
        for prereq in node.prerequisites() {
            if self.is_stale(prereq)? {
                return Ok(true);
            }
            if let Some(prereq_mtime) = self.prerequisite_mtime(id, prereq)? {
                if prereq_mtime > output_mtime {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Modification time of a prerequisite, or `None` for a registered
    /// target with no output file yet (phony).
    fn prerequisite_mtime(
        &self,
        target: &Utf8Path,
        prereq: &Utf8Path,
    ) -> Result<Option<SystemTime>, GraphError> {
        match modified_at(prereq)? {
            Some(mtime) => Ok(Some(mtime)),
            None => {
                if self.graph.node(prereq).is_some() {
                    Ok(None)
                } else {
                    Err(GraphError::DanglingPrerequisite {
                        target: target.to_owned(),
                        prerequisite: prereq.to_owned(),
                    })
                }
            }
        }
    }
}

fn modified_at(path: &Utf8Path) -> Result<Option<SystemTime>, GraphError> {
    match fs::metadata(path.as_std_path()) {
        Ok(metadata) => metadata
            .modified()
            .map(Some)
            .map_err(|source| GraphError::Metadata {
                path: path.to_owned(),
                source,
            }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(GraphError::Metadata {
            path: path.to_owned(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        reason = "tests use expect for descriptive failures"
    )]

    use super::*;
    use crate::action::{Action, ActionError};
    use crate::graph::TaskNode;
    use camino::Utf8PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct NoopAction;

    impl Action for NoopAction {
        fn describe(&self) -> String {
            "noop".to_owned()
        }

        fn execute(&self) -> Result<(), ActionError> {
            Ok(())
        }
    }

    struct Fixture {
        _temp: TempDir,
        root: Utf8PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().expect("tempdir");
            let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
            Self { _temp: temp, root }
        }

        fn write(&self, name: &str, offset_secs: i64) -> Utf8PathBuf {
            let path = self.root.join(name);
            fs::write(path.as_std_path(), name).expect("write file");
            let now = SystemTime::now();
            let mtime = if offset_secs >= 0 {
                now + Duration::from_secs(offset_secs.unsigned_abs())
            } else {
                now - Duration::from_secs(offset_secs.unsigned_abs())
            };
            fs::File::options()
                .append(true)
                .open(path.as_std_path())
                .expect("open file")
                .set_modified(mtime)
                .expect("set mtime");
            path
        }
    }

    fn file_node(output: &Utf8Path, prereqs: Vec<Utf8PathBuf>) -> TaskNode {
        TaskNode::file(output.to_owned(), prereqs, Box::new(NoopAction))
    }

    #[test]
    fn missing_output_is_stale() {
        let fx = Fixture::new();
        let source = fx.write("input", -100);
        let output = fx.root.join("out");
        let mut graph = TaskGraph::new();
        graph
            .register(file_node(&output, vec![source]))
            .expect("register");
        assert!(StalenessChecker::new(&graph)
            .is_stale(&output)
            .expect("check"));
    }

    #[test]
    fn newer_prerequisite_makes_target_stale() {
        let fx = Fixture::new();
        let source = fx.write("input", 100);
        let output = fx.write("out", 0);
        let mut graph = TaskGraph::new();
        graph
            .register(file_node(&output, vec![source]))
            .expect("register");
        assert!(StalenessChecker::new(&graph)
            .is_stale(&output)
            .expect("check"));
    }

    #[test]
    fn older_prerequisite_leaves_target_fresh() {
        let fx = Fixture::new();
        let source = fx.write("input", -100);
        let output = fx.write("out", 0);
        let mut graph = TaskGraph::new();
        graph
            .register(file_node(&output, vec![source]))
            .expect("register");
        assert!(!StalenessChecker::new(&graph)
            .is_stale(&output)
            .expect("check"));
    }

    #[test]
    fn staleness_cascades_through_intermediate_targets() {
        // input (new) -> mid (old) -> out (old): out is stale because mid is.
        let fx = Fixture::new();
        let input = fx.write("input", 100);
        let mid = fx.write("mid", -50);
        let out = fx.write("out", 0);
        let mut graph = TaskGraph::new();
        graph
            .register(file_node(&mid, vec![input]))
            .expect("register mid");
        graph
            .register(file_node(&out, vec![mid.clone()]))
            .expect("register out");
        assert!(StalenessChecker::new(&graph).is_stale(&out).expect("check"));
    }

    #[test]
    fn phony_target_always_needs_evaluation() {
        let mut graph = TaskGraph::new();
        graph
            .register(TaskNode::phony("all", Vec::new()))
            .expect("register");
        assert!(StalenessChecker::new(&graph)
            .is_stale(Utf8Path::new("all"))
            .expect("check"));
    }

    #[test]
    fn unregistered_path_is_never_stale() {
        let graph = TaskGraph::new();
        assert!(!StalenessChecker::new(&graph)
            .is_stale(Utf8Path::new("plain-file"))
            .expect("check"));
    }

    #[test]
    fn dangling_prerequisite_is_fatal() {
        let fx = Fixture::new();
        let output = fx.write("out", 0);
        let missing = fx.root.join("no-such-input");
        let mut graph = TaskGraph::new();
        graph
            .register(file_node(&output, vec![missing.clone()]))
            .expect("register");
        let err = StalenessChecker::new(&graph)
            .is_stale(&output)
            .expect_err("dangling");
        assert!(matches!(
            err,
            GraphError::DanglingPrerequisite { prerequisite, .. } if prerequisite == missing
        ));
    }
}

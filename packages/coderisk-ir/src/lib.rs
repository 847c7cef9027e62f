//! AST parsing and property-graph extraction (component C2).
//!
//! Parses a single source file with `tree-sitter` and emits the `File`,
//! `Function`, and `Class` nodes and `CONTAINS`/`IMPORTS`/`CALLS` edges
//! defined by the data model. Go, Python, TypeScript, and JavaScript are
//! supported; any other extension is skipped by the caller via
//! [`Language::from_path`] returning `None`.

pub mod error;
pub mod graph_builder;
pub mod language;
pub mod model;
pub mod parser;

pub use error::{IrError, Result};
pub use graph_builder::{is_test_path, GraphBuilder};
pub use language::Language;
pub use model::{is_noise_only, Edge, EdgeKind, FileGraph, ModificationKind, Node, NodeKind, Span};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_supported_languages() {
        assert_eq!(
            Language::from_path(std::path::Path::new("main.go")),
            Some(Language::Go)
        );
        assert_eq!(
            Language::from_path(std::path::Path::new("app.py")),
            Some(Language::Python)
        );
        assert_eq!(Language::from_path(std::path::Path::new("README.md")), None);
    }

    #[test]
    fn builds_python_file_graph() {
        let source = "def foo():\n    bar()\n\nclass Thing:\n    def method(self):\n        pass\n";
        let graph = GraphBuilder::build_file("pkg/mod.py", Language::Python, source).unwrap();

        assert!(graph
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::File && n.id == "pkg/mod.py"));
        assert!(graph
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Function && n.id == "pkg/mod.py::foo"));
        assert!(graph
            .nodes
            .iter()
            .any(|n| n.kind == NodeKind::Class && n.id == "pkg/mod.py::Thing"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Contains && e.to == "pkg/mod.py::foo"));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Calls && e.from == "pkg/mod.py::foo"));
    }

    #[test]
    fn parse_failure_is_isolated_per_file() {
        // An empty source still produces a tree (tree-sitter never errors on
        // empty input); malformed input yields ERROR nodes rather than a
        // hard failure, consistent with the parser's per-file isolation
        // contract -- the caller decides what counts as "good enough".
        let graph = GraphBuilder::build_file("empty.py", Language::Python, "").unwrap();
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn detects_test_paths() {
        assert!(is_test_path("pkg/foo_test.go"));
        assert!(is_test_path("app/test_models.py"));
        assert!(is_test_path("web/src/components/Button.test.ts"));
        assert!(!is_test_path("pkg/foo.go"));
    }
}

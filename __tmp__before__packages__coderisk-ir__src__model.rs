use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Byte/line span of a node within its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub end_line: u32,
}

/// The full set of node kinds in the property graph, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Function,
    Class,
    Commit,
    Developer,
    Issue,
    PullRequest,
}

/// A node's natural key is `(kind, id)`; `id` is kind-specific (a repo-
/// relative path for `File`, `path::qualified_name` for `Function`/`Class`,
/// a commit sha for `Commit`, an email for `Developer`, a tracker id for
/// `Issue`/`PullRequest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub id: String,
    pub span: Option<Span>,
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Node {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Node {
            kind,
            id: id.into(),
            span: None,
            attrs: HashMap::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    Calls,
    Tests,
    Authored,
    Modifies,
    CoChanged,
    Affects,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(kind: EdgeKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Edge {
            kind,
            from: from.into(),
            to: to.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }
}

/// Output of parsing and graph-extracting a single file: the nodes/edges it
/// contributed, or the error that caused it to be skipped. A per-file
/// failure never aborts the batch — see `IrError::Parse`.
#[derive(Debug, Clone, Default)]
pub struct FileGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl FileGraph {
    pub fn merge(&mut self, other: FileGraph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }
}



use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use coderisk_ir::{Edge, EdgeKind, Node, NodeKind};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// The property graph store (component C1, graph side). Writes are
/// upserts keyed by a node's `(kind, id)` or an edge's `(kind, from, to)`,
/// so re-ingesting an unchanged file is idempotent.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_nodes(&self, nodes: &[Node]) -> Result<()>;
    async fn upsert_edges(&self, edges: &[Edge]) -> Result<()>;

    /// Neighbors reachable via one edge kind in the given direction.
    async fn neighbors(&self, node_id: &str, kind: EdgeKind, dir: Direction) -> Result<Vec<String>>;

    /// Like [`neighbors`](GraphStore::neighbors), but also returns each
    /// edge's `frequency` attribute (1.0 if the edge carries none), so
    /// callers that need to threshold on edge weight -- the coordinator's
    /// `CO_CHANGED` closure -- don't have to re-fetch attributes per edge.
    async fn weighted_neighbors(
        &self,
        node_id: &str,
        kind: EdgeKind,
        dir: Direction,
    ) -> Result<Vec<(String, f64)>>;

    /// A stable hash of the graph's current content, used as part of the
    /// metric cache key so a cache entry invalidates whenever the graph
    /// backing it changes.
    async fn content_hash(&self) -> Result<String>;

    async fn node_exists(&self, id: &str) -> Result<bool>;

    /// Fetches one node by its natural key, if present -- used by metrics
    /// that need a node's own attributes (a `File`'s `loc`) rather than
    /// just its neighbors.
    async fn node(&self, kind: NodeKind, id: &str) -> Result<Option<Node>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub created_ts: i64,
    pub closed_ts: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct IncidentHit {
    pub incident: Incident,
    pub score: f32,
}

/// The incident relational store (component C1, relational side / C4's
/// write target). `search` provides the generalized full-text ranking a
/// PostgreSQL GIN index would give in production.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn upsert(&self, incident: &Incident) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Incident>>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<IncidentHit>>;
}

//! Property graph store and incident relational store (component C1).
//!
//! `GraphStore` and `IncidentStore` are the domain ports; the `sqlite`
//! adapters in [`infrastructure`] are the implementations this repository
//! ships, chosen because a pre-commit hook cannot depend on a running
//! database service.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::{Direction, GraphStore, Incident, IncidentHit, IncidentStore};
pub use error::{Result, StorageError};
pub use infrastructure::{SqliteGraphStore, SqliteIncidentStore};

#[cfg(test)]
mod tests {
    use super::*;
    use coderisk_ir::{Edge, EdgeKind, Node, NodeKind};

    #[tokio::test]
    async fn graph_store_upsert_is_idempotent() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let node = Node::new(NodeKind::File, "a.go");
        store.upsert_nodes(&[node.clone()]).await.unwrap();
        store.upsert_nodes(&[node]).await.unwrap();
        assert!(store.node_exists("a.go").await.unwrap());
    }

    #[tokio::test]
    async fn graph_store_neighbors_respect_direction() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .upsert_edges(&[Edge::new(EdgeKind::Calls, "a::foo", "b::bar")])
            .await
            .unwrap();

        let out = store
            .neighbors("a::foo", EdgeKind::Calls, Direction::Outgoing)
            .await
            .unwrap();
        assert_eq!(out, vec!["b::bar".to_string()]);

        let incoming = store
            .neighbors("b::bar", EdgeKind::Calls, Direction::Incoming)
            .await
            .unwrap();
        assert_eq!(incoming, vec!["a::foo".to_string()]);
    }

    #[tokio::test]
    async fn content_hash_changes_with_graph_content() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let before = store.content_hash().await.unwrap();
        store
            .upsert_nodes(&[Node::new(NodeKind::File, "a.go")])
            .await
            .unwrap();
        let after = store.content_hash().await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn incident_store_full_text_search() {
        let store = SqliteIncidentStore::open_in_memory().unwrap();
        store
            .upsert(&Incident {
                id: "INC-1".into(),
                title: "payment webhook retried infinitely".into(),
                body: "the retry loop never backed off".into(),
                labels: vec!["payments".into()],
                created_ts: 0,
                closed_ts: None,
            })
            .await
            .unwrap();

        let hits = store.search("webhook retry", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].incident.id, "INC-1");
    }

    #[tokio::test]
    async fn incident_store_get_roundtrip() {
        let store = SqliteIncidentStore::open_in_memory().unwrap();
        store
            .upsert(&Incident {
                id: "INC-2".into(),
                title: "t".into(),
                body: "b".into(),
                labels: vec![],
                created_ts: 10,
                closed_ts: Some(20),
            })
            .await
            .unwrap();
        let got = store.get("INC-2").await.unwrap().unwrap();
        assert_eq!(got.closed_ts, Some(20));
        assert!(store.get("missing").await.unwrap().is_none());
    }
}

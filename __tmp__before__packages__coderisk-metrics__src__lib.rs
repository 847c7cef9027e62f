//! The metric registry (component C6): tiered, cached risk signals
//! computed over the property graph, git history, and incident store.

pub mod error;
pub mod registry;
pub mod tier1;
pub mod tier2;

pub use error::{MetricError, Result};
pub use registry::{Band, Metric, MetricContext, MetricRegistry, MetricResult, Tier};
pub use tier1::{StructuralCoupling, TemporalCoChange, TestCoverageRatio};
pub use tier2::{IncidentSimilarity, OwnershipChurn};

/// Builds the registry with every Tier 1 and Tier 2 metric this
/// repository ships, using default thresholds.
pub fn default_registry(repo_path: std::path::PathBuf) -> MetricRegistry {
    let mut registry = MetricRegistry::new();
    registry.register(std::sync::Arc::new(StructuralCoupling::default()));
    registry.register(std::sync::Arc::new(TemporalCoChange::default()));
    registry.register(std::sync::Arc::new(TestCoverageRatio::default()));
    registry.register(std::sync::Arc::new(OwnershipChurn { repo_path }));
    registry.register(std::sync::Arc::new(IncidentSimilarity::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderisk_ir::{Edge, EdgeKind, Node, NodeKind};
    use coderisk_storage::{Incident, IncidentStore, SqliteGraphStore, SqliteIncidentStore};
    use std::sync::Arc;

    async fn test_context() -> MetricContext {
        let graph = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph
            .upsert_nodes(&[Node::new(NodeKind::File, "pkg/risky.go")])
            .await
            .unwrap();
        graph
            .upsert_edges(&[
                Edge::new(EdgeKind::Imports, "pkg/risky.go", "pkg/a.go"),
                Edge::new(EdgeKind::Calls, "pkg/risky.go", "pkg/b.go"),
            ])
            .await
            .unwrap();

        let incidents = Arc::new(SqliteIncidentStore::open_in_memory().unwrap());
        incidents
            .upsert(&Incident {
                id: "INC-1".into(),
                title: "pkg risky go outage".into(),
                body: "risky go file caused an outage".into(),
                labels: vec![],
                created_ts: 0,
                closed_ts: None,
            })
            .await
            .unwrap();

        MetricContext {
            graph,
            incidents,
            file_path: "pkg/risky.go".to_string(),
        }
    }

    #[tokio::test]
    async fn structural_coupling_bands_by_union_size() {
        let ctx = test_context().await;
        let metric: Arc<dyn Metric> = Arc::new(StructuralCoupling::default());
        let registry = MetricRegistry::new();
        let result = registry.compute(&metric, &ctx).await.unwrap();
        assert_eq!(result.value, 2.0);
        assert_eq!(result.band, Band::Low);
    }

    #[tokio::test]
    async fn registry_cache_hits_on_unchanged_content_hash() {
        let ctx = test_context().await;
        let metric: Arc<dyn Metric> = Arc::new(StructuralCoupling::default());
        let registry = MetricRegistry::new();
        let first = registry.compute(&metric, &ctx).await.unwrap();
        let second = registry.compute(&metric, &ctx).await.unwrap();
        assert_eq!(first.value, second.value);
    }

    #[tokio::test]
    async fn incident_similarity_finds_matching_incident() {
        let ctx = test_context().await;
        let metric: Arc<dyn Metric> = Arc::new(IncidentSimilarity::default());
        let registry = MetricRegistry::new();
        let result = registry.compute(&metric, &ctx).await.unwrap();
        assert!(result.value > 0.0);
    }
}



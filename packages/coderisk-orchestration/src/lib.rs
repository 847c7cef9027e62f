//! Ingestion pipeline (C5), Phase-1 baseline engine (C8), Phase-2
//! investigator (C9), and multi-file coordinator (C10).

pub mod coordinate;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod phase1;
pub mod phase2;

pub use coordinate::MultiFileCoordinator;
pub use error::{ErrorCategory, OrchestratorError, Result};
pub use ingest::{IngestStats, IngestionOrchestrator, IncidentSource, JsonFileIncidentSource};
pub use llm::{Action, LlmClient, OpenAiCompatibleClient, RiskLevel, Synthesis};
pub use phase1::{BaselineEngine, BaselineResult};
pub use phase2::{Investigator, Verdict, CONFIDENCE_THRESHOLD, HOP_MAX};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coderisk_ir::{Edge, EdgeKind, ModificationKind, Node, NodeKind};
    use coderisk_metrics::MetricRegistry;
    use coderisk_storage::{GraphStore, SqliteGraphStore, SqliteIncidentStore};
    use std::collections::HashMap;
    use std::process::Command;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .status()
                .unwrap();
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "dev@example.com"]);
        run(&["config", "user.name", "Dev"]);
        std::fs::write(dir.path().join("main.py"), "def handler():\n    pass\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "init"]);
        dir
    }

    #[tokio::test]
    async fn ingestion_runs_all_three_layers_in_order() {
        let dir = init_repo();
        let graph = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        let incidents = Arc::new(SqliteIncidentStore::open_in_memory().unwrap());
        let orchestrator = IngestionOrchestrator::new(graph.clone(), incidents);

        let stats = orchestrator
            .ingest_repository(dir.path(), 90, 0.0, coderisk_git::DEFAULT_MAX_FILES_PER_COMMIT, None)
            .await
            .unwrap();

        assert_eq!(stats.files_parsed, 1);
        assert_eq!(stats.commits_walked, 1);
        assert!(graph.node_exists("main.py").await.unwrap());
    }

    /// A canned `LlmClient` for tests: always finalizes immediately at a
    /// fixed confidence, so the investigator loop terminates deterministically.
    struct StubLlm {
        risk_level: RiskLevel,
        confidence: f64,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn decide(&self, _system_prompt: &str, _evidence: &serde_json::Value) -> Result<Action> {
            Ok(Action::Finalize {
                risk_level: self.risk_level,
                confidence: self.confidence,
                recommendations: vec!["review pkg/a.py's new fan-out before merging".to_string()],
            })
        }

        async fn synthesize(&self, _system_prompt: &str, _evidence: &serde_json::Value) -> Result<Synthesis> {
            Ok(Synthesis {
                risk_level: self.risk_level,
                confidence: self.confidence,
                key_factors: vec!["structural coupling and churn are both elevated".to_string()],
                recommendations: vec!["review pkg/a.py's new fan-out before merging".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn coordinator_produces_one_verdict_per_uncoupled_file() {
        let graph = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph
            .upsert_nodes(&[
                Node::new(NodeKind::File, "a.py"),
                Node::new(NodeKind::File, "b.py"),
            ])
            .await
            .unwrap();
        // Give a.py enough fan-out to escalate past the structural coupling band.
        for i in 0..20 {
            graph
                .upsert_edges(&[Edge::new(EdgeKind::Imports, "a.py", format!("dep{i}.py"))])
                .await
                .unwrap();
        }
        let incidents = Arc::new(SqliteIncidentStore::open_in_memory().unwrap());

        let mut registry = MetricRegistry::new();
        registry.register(Arc::new(coderisk_metrics::StructuralCoupling::default()));
        registry.register(Arc::new(coderisk_metrics::TemporalCoChange::default()));
        registry.register(Arc::new(coderisk_metrics::TestCoverageRatio::default()));
        let registry = Arc::new(registry);

        let llm = Arc::new(StubLlm {
            risk_level: RiskLevel::High,
            confidence: 0.9,
        });
        let coordinator = MultiFileCoordinator::new(graph, incidents, registry, llm);

        let kinds: HashMap<String, Vec<ModificationKind>> = HashMap::new();
        let verdicts = coordinator
            .evaluate_changed_files(&["a.py".to_string(), "b.py".to_string()], &kinds)
            .await
            .unwrap();

        assert_eq!(verdicts.len(), 2);
        let a_verdict = verdicts.iter().find(|v| v.files.contains(&"a.py".to_string())).unwrap();
        assert_eq!(a_verdict.risk_level, RiskLevel::High);
    }
}

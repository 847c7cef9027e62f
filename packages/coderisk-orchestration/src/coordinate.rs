use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use coderisk_ir::{EdgeKind, ModificationKind};
use coderisk_metrics::{Band, MetricContext, MetricRegistry};
use coderisk_storage::{Direction, GraphStore, IncidentStore};

use crate::error::Result;
use crate::llm::{LlmClient, RiskLevel};
use crate::phase1::{BaselineEngine, BaselineResult};
use crate::phase2::{Investigator, Verdict};

/// Transitive co-change frequency above which two files are folded into
/// the same coupled set, per the coordinator's closure rule.
pub const COUPLING_THRESHOLD: f64 = 0.7;

/// Groups changed files into co-change-coupled sets and runs one Phase-2
/// investigation per coupled set of size >= 2 that escalates; escalated
/// singletons are investigated individually.
pub struct MultiFileCoordinator {
    pub graph: Arc<dyn GraphStore>,
    pub incidents: Arc<dyn IncidentStore>,
    pub baseline: BaselineEngine,
    pub investigator: Investigator,
}

impl MultiFileCoordinator {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        incidents: Arc<dyn IncidentStore>,
        registry: Arc<MetricRegistry>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        MultiFileCoordinator {
            graph: graph.clone(),
            incidents: incidents.clone(),
            baseline: BaselineEngine::new(registry.clone()),
            investigator: Investigator::new(graph, incidents, registry, llm),
        }
    }

    fn context_for(&self, file_path: &str) -> MetricContext {
        MetricContext {
            graph: self.graph.clone(),
            incidents: self.incidents.clone(),
            file_path: file_path.to_string(),
        }
    }

    /// Finds the transitive closure of files coupled to `start` at or above
    /// [`COUPLING_THRESHOLD`], via `CO_CHANGED` edges in either direction.
    async fn coupled_set(&self, start: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start.to_string());
        queue.push_back(start.to_string());

        while let Some(current) = queue.pop_front() {
            let mut partners = self
                .graph
                .weighted_neighbors(&current, EdgeKind::CoChanged, Direction::Outgoing)
                .await?;
            partners.extend(
                self.graph
                    .weighted_neighbors(&current, EdgeKind::CoChanged, Direction::Incoming)
                    .await?,
            );
            for (partner, frequency) in partners {
                if frequency >= COUPLING_THRESHOLD && seen.insert(partner.clone()) {
                    queue.push_back(partner);
                }
            }
        }

        let mut set: Vec<String> = seen.into_iter().collect();
        set.sort();
        Ok(set)
    }

    /// Coordinates investigation across every changed file, returning one
    /// verdict per investigated target (a single file, or a whole coupled
    /// group investigated together).
    ///
    /// `modification_kinds` maps each changed file to the kinds the Phase-0
    /// classifier observed for it; a file absent from the map is treated as
    /// having no observed kinds (baseline escalation based on kinds alone
    /// then never fires for it, but Tier 1 band escalation still can).
    pub async fn evaluate_changed_files(
        &self,
        changed_files: &[String],
        modification_kinds: &std::collections::HashMap<String, Vec<ModificationKind>>,
    ) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::new();
        let mut handled = HashSet::new();
        let empty_kinds: Vec<ModificationKind> = Vec::new();

        for file_path in changed_files {
            if handled.contains(file_path) {
                continue;
            }

            let coupled = self.coupled_set(file_path).await?;
            let coupled_changed: Vec<String> = coupled
                .into_iter()
                .filter(|f| changed_files.contains(f))
                .collect();

            if coupled_changed.len() >= 2 {
                for f in &coupled_changed {
                    handled.insert(f.clone());
                }

                let mut baselines = Vec::with_capacity(coupled_changed.len());
                for f in &coupled_changed {
                    let ctx = self.context_for(f);
                    let kinds = modification_kinds.get(f).unwrap_or(&empty_kinds);
                    baselines.push(self.baseline.evaluate(&ctx, kinds).await);
                }

                verdicts.push(self.resolve_group(&coupled_changed, baselines).await?);
            } else {
                handled.insert(file_path.clone());
                let ctx = self.context_for(file_path);
                let kinds = modification_kinds.get(file_path).unwrap_or(&empty_kinds);
                let baseline = self.baseline.evaluate(&ctx, kinds).await;
                verdicts.push(self.resolve_group(&[file_path.clone()], vec![baseline]).await?);
            }
        }

        Ok(verdicts)
    }

    /// Runs a single investigation over the whole `files` set when any
    /// member's baseline escalated; otherwise returns a baseline-only
    /// verdict summarizing every file's Phase-1 result.
    async fn resolve_group(&self, files: &[String], baselines: Vec<BaselineResult>) -> Result<Verdict> {
        let escalate = baselines.iter().any(|b| b.escalate);
        let phase1: Vec<coderisk_metrics::MetricResult> =
            baselines.iter().flat_map(|b| b.results.clone()).collect();
        let fallback_band = band_to_risk_level(baselines.iter().map(|b| b.max_band).max().unwrap_or(Band::Low));

        if escalate {
            self.investigator.investigate(files, phase1, fallback_band).await
        } else {
            Ok(baseline_only_verdict(files, phase1, fallback_band))
        }
    }
}

fn band_to_risk_level(band: Band) -> RiskLevel {
    match band {
        Band::Low => RiskLevel::Low,
        Band::Medium => RiskLevel::Medium,
        Band::High => RiskLevel::High,
    }
}

fn baseline_only_verdict(
    files: &[String],
    phase1: Vec<coderisk_metrics::MetricResult>,
    risk_level: RiskLevel,
) -> Verdict {
    Verdict {
        files: files.to_vec(),
        risk_level,
        confidence: 1.0,
        phase1,
        key_factors: vec!["no escalation signal from the Phase-1 baseline".to_string()],
        recommendations: Vec::new(),
        hops: Vec::new(),
        degraded: false,
    }
}

/// Pure connected-components form of [`MultiFileCoordinator::coupled_set`],
/// over a fully-materialized `CO_CHANGED` edge list instead of a live
/// graph store. Exercises the same closure rule the async BFS applies one
/// edge at a time, in a form `proptest` can drive directly.
#[cfg(test)]
fn group_by_coupling(edges: &[(String, String, f64)], threshold: f64) -> Vec<Vec<String>> {
    use std::collections::HashMap;

    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for (a, b, frequency) in edges {
        if *frequency < threshold {
            continue;
        }
        adjacency.entry(a.clone()).or_default().push(b.clone());
        adjacency.entry(b.clone()).or_default().push(a.clone());
    }

    let mut visited = HashSet::new();
    let mut groups = Vec::new();
    let mut nodes: Vec<&String> = adjacency.keys().collect();
    nodes.sort();

    for node in nodes {
        if !visited.insert(node.clone()) {
            continue;
        }
        let mut group = vec![node.clone()];
        let mut queue = VecDeque::new();
        queue.push_back(node.clone());
        while let Some(current) = queue.pop_front() {
            if let Some(partners) = adjacency.get(&current) {
                for partner in partners {
                    if visited.insert(partner.clone()) {
                        group.push(partner.clone());
                        queue.push_back(partner.clone());
                    }
                }
            }
        }
        group.sort();
        groups.push(group);
    }
    groups
}

#[cfg(test)]
mod coupling_properties {
    use super::group_by_coupling;
    use proptest::prelude::*;

    proptest! {
        /// For every pair with `CO_CHANGED.frequency >= COUPLING_THRESHOLD`,
        /// both endpoints end up in the same group.
        #[test]
        fn coupled_pairs_are_co_located(frequency in 0.7f64..=1.0) {
            let edges = vec![("a.py".to_string(), "b.py".to_string(), frequency)];
            let groups = group_by_coupling(&edges, super::COUPLING_THRESHOLD);

            let group = groups.iter().find(|g| g.contains(&"a.py".to_string()));
            prop_assert!(group.is_some());
            prop_assert!(group.unwrap().contains(&"b.py".to_string()));
        }

        /// A pair below threshold never gets folded into the same group.
        #[test]
        fn uncoupled_pairs_stay_separate(frequency in 0.0f64..0.7) {
            let edges = vec![("a.py".to_string(), "b.py".to_string(), frequency)];
            let groups = group_by_coupling(&edges, super::COUPLING_THRESHOLD);

            prop_assert!(groups.iter().all(|g| g.len() == 1));
        }
    }
}

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use coderisk_ir::EdgeKind;
use coderisk_metrics::{MetricContext, MetricRegistry, MetricResult, Tier};
use coderisk_storage::{Direction, GraphStore, IncidentStore};

use crate::error::{OrchestratorError, Result};
use crate::llm::{Action, LlmClient, RiskLevel, INVESTIGATOR_SYSTEM_PROMPT};

pub const HOP_MAX: usize = 5;
pub const CONFIDENCE_THRESHOLD: f64 = 0.85;

/// Every edge kind the graph can hold, walked by `ExpandGraph` in both
/// directions -- the investigator has no a-priori reason to prefer one
/// kind over another when the model asks for "more context".
const ALL_EDGE_KINDS: &[EdgeKind] = &[
    EdgeKind::Contains,
    EdgeKind::Imports,
    EdgeKind::Calls,
    EdgeKind::Tests,
    EdgeKind::Authored,
    EdgeKind::Modifies,
    EdgeKind::CoChanged,
    EdgeKind::Affects,
];

#[derive(Debug, Clone, Serialize)]
pub struct Hop {
    pub action: Action,
    pub observation: serde_json::Value,
}

/// One investigation's output, covering the whole target set -- a single
/// file, or a coupled group sharing one investigation (component C10).
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub files: Vec<String>,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub phase1: Vec<MetricResult>,
    pub key_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub hops: Vec<Hop>,
    pub degraded: bool,
}

/// Runs the bounded-hop agentic investigation (component C9) for one
/// target set that escalated out of Phase-1.
pub struct Investigator {
    pub graph: Arc<dyn GraphStore>,
    pub incidents: Arc<dyn IncidentStore>,
    pub registry: Arc<MetricRegistry>,
    pub llm: Arc<dyn LlmClient>,
}

impl Investigator {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        incidents: Arc<dyn IncidentStore>,
        registry: Arc<MetricRegistry>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Investigator {
            graph,
            incidents,
            registry,
            llm,
        }
    }

    fn context_for(&self, file_path: &str) -> MetricContext {
        MetricContext {
            graph: self.graph.clone(),
            incidents: self.incidents.clone(),
            file_path: file_path.to_string(),
        }
    }

    /// Investigates the whole `files` set as one target -- a single
    /// changed file, or an entire coupled group (C10 invokes this once per
    /// group, never once per file within it).
    pub async fn investigate(&self, files: &[String], phase1: Vec<MetricResult>, fallback_band: RiskLevel) -> Result<Verdict> {
        info!(?files, "starting phase-2 investigation");
        let mut hops = Vec::new();
        let mut evidence = json!({
            "files": files,
            "phase1": phase1,
            "hops": [],
        });
        let mut consecutive_failures = 0u8;

        for hop_index in 0..HOP_MAX {
            let action = match self.llm.decide(INVESTIGATOR_SYSTEM_PROMPT, &evidence).await {
                Ok(a) => {
                    consecutive_failures = 0;
                    a
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(hop = hop_index, error = %e, "investigator decision call failed");
                    if consecutive_failures >= 2 {
                        return Ok(degraded_verdict(files, phase1, fallback_band, hops));
                    }
                    continue;
                }
            };

            if let Action::Finalize {
                risk_level,
                confidence,
                recommendations,
            } = action
            {
                if is_acceptable_recommendations(&recommendations) {
                    return Ok(Verdict {
                        files: files.to_vec(),
                        risk_level,
                        confidence,
                        phase1,
                        key_factors: vec!["the investigator finalized directly from the gathered evidence".to_string()],
                        recommendations,
                        hops,
                        degraded: false,
                    });
                }
                warn!("finalize action's recommendations failed the acceptability filter, falling back to synthesis");
                break;
            }

            let confidence = action.confidence();
            let observation = self.execute_action(&action).await?;
            hops.push(Hop {
                action: action.clone(),
                observation: observation.clone(),
            });
            evidence["hops"]
                .as_array_mut()
                .expect("hops is always an array")
                .push(json!({ "action": action, "observation": observation }));

            // Force a finalize on the next step once confidence reaches the
            // threshold, or once the hop budget is exhausted, per the
            // investigation algorithm's forced-finalize clause.
            if confidence >= CONFIDENCE_THRESHOLD || hop_index == HOP_MAX - 1 {
                break;
            }
        }

        let synthesis = match self.synthesize_with_retry(&evidence).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "synthesis failed after retry, falling back to phase-1 band");
                return Ok(degraded_verdict(files, phase1, fallback_band, hops));
            }
        };

        Ok(Verdict {
            files: files.to_vec(),
            risk_level: synthesis.risk_level,
            confidence: synthesis.confidence,
            phase1,
            key_factors: synthesis.key_factors,
            recommendations: synthesis.recommendations,
            hops,
            degraded: false,
        })
    }

    async fn synthesize_with_retry(&self, evidence: &serde_json::Value) -> Result<crate::llm::Synthesis> {
        let first = self.llm.synthesize(INVESTIGATOR_SYSTEM_PROMPT, evidence).await?;
        if is_acceptable_recommendations(&first.recommendations) {
            return Ok(first);
        }
        warn!("regenerating synthesis after first attempt failed the recommendation filter");
        self.llm.synthesize(INVESTIGATOR_SYSTEM_PROMPT, evidence).await
    }

    async fn execute_action(&self, action: &Action) -> Result<serde_json::Value> {
        match action {
            Action::CalculateMetric { metric_id, file, .. } => {
                let metric = self
                    .registry
                    .tier(Tier::Two)
                    .into_iter()
                    .find(|m| m.id() == metric_id)
                    .ok_or_else(|| OrchestratorError::Llm(format!("unknown metric {metric_id}")))?;
                let ctx = self.context_for(file);
                let result = self.registry.compute(&metric, &ctx).await?;
                Ok(serde_json::to_value(result).unwrap_or(serde_json::Value::Null))
            }
            Action::ExpandGraph { file, hop_radius, .. } => {
                let neighbors = self.expand_neighborhood(file, (*hop_radius).min(3)).await?;
                Ok(json!({ "file": file, "neighbors": neighbors }))
            }
            Action::SearchIncidents { query, .. } => {
                let hits = self.incidents.search(query, 5).await?;
                let ids: Vec<String> = hits.iter().map(|h| h.incident.id.clone()).collect();
                Ok(json!({ "incident_ids": ids }))
            }
            Action::Finalize { .. } => unreachable!("finalize is handled by the caller"),
        }
    }

    /// Breadth-first expansion from `start` across every edge kind in both
    /// directions, out to `hop_radius` hops.
    async fn expand_neighborhood(&self, start: &str, hop_radius: u32) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        seen.insert(start.to_string());
        let mut frontier = vec![start.to_string()];

        for _ in 0..hop_radius {
            let mut next = Vec::new();
            for node in &frontier {
                for kind in ALL_EDGE_KINDS {
                    for dir in [Direction::Outgoing, Direction::Incoming] {
                        let hits = self.graph.neighbors(node, *kind, dir).await?;
                        for hit in hits {
                            if seen.insert(hit.clone()) {
                                next.push(hit);
                            }
                        }
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        seen.remove(start);
        let mut out: Vec<String> = seen.into_iter().collect();
        out.sort();
        Ok(out)
    }
}

fn degraded_verdict(files: &[String], phase1: Vec<MetricResult>, fallback_band: RiskLevel, hops: Vec<Hop>) -> Verdict {
    Verdict {
        files: files.to_vec(),
        risk_level: fallback_band,
        confidence: 0.0,
        phase1,
        key_factors: vec!["investigation degraded after repeated evidence-gathering failures".to_string()],
        recommendations: vec!["re-run once the LLM provider is reachable; treat this verdict as provisional".to_string()],
        hops,
        degraded: true,
    }
}

/// The recommendation post-filter: recommendations must be non-empty and
/// must cite something concrete, not a generic platitude.
fn is_acceptable_recommendations(recommendations: &[String]) -> bool {
    !recommendations.is_empty()
        && recommendations.iter().all(|r| r.trim().len() > 10)
        && !recommendations
            .iter()
            .any(|r| r.trim().eq_ignore_ascii_case("review the change carefully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_recommendations() {
        assert!(!is_acceptable_recommendations(&[]));
    }

    #[test]
    fn rejects_generic_recommendation() {
        assert!(!is_acceptable_recommendations(&["review the change carefully".to_string()]));
    }

    #[test]
    fn accepts_concrete_recommendation() {
        assert!(is_acceptable_recommendations(&[
            "add tests for pkg/auth.py::login before merging".to_string()
        ]));
    }
}

use async_trait::async_trait;
use coderisk_ir::EdgeKind;
use coderisk_storage::Direction;
use serde_json::json;
use std::collections::HashSet;

use crate::error::Result;
use crate::registry::{Band, Metric, MetricContext, MetricResult, Tier};

/// Structural coupling: the union of a file's `IMPORTS` and `CALLS`
/// neighbors. A file wired into many others is riskier to change blind.
pub struct StructuralCoupling {
    pub medium_at: usize,
    pub high_at: usize,
}

impl Default for StructuralCoupling {
    fn default() -> Self {
        StructuralCoupling {
            medium_at: 5,
            high_at: 15,
        }
    }
}

#[async_trait]
impl Metric for StructuralCoupling {
    fn id(&self) -> &'static str {
        "structural_coupling"
    }

    fn tier(&self) -> Tier {
        Tier::One
    }

    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult> {
        let imports = ctx
            .graph
            .neighbors(&ctx.file_path, EdgeKind::Imports, Direction::Outgoing)
            .await?;
        let calls = ctx
            .graph
            .neighbors(&ctx.file_path, EdgeKind::Calls, Direction::Outgoing)
            .await?;

        let union: HashSet<String> = imports.iter().chain(calls.iter()).cloned().collect();
        let count = union.len();

        let band = if count >= self.high_at {
            Band::High
        } else if count >= self.medium_at {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: count as f64,
            band,
            evidence: json!({ "imports": imports.len(), "calls": calls.len(), "union": count }),
            duration_ms: 0,
        })
    }
}

/// Temporal co-change: the strongest `CO_CHANGED` frequency this file
/// participates in, per invariant I2's union-of-touching-commits
/// denominator.
pub struct TemporalCoChange {
    pub medium_at: f64,
    pub high_at: f64,
}

impl Default for TemporalCoChange {
    fn default() -> Self {
        TemporalCoChange {
            medium_at: 0.3,
            high_at: 0.6,
        }
    }
}

#[async_trait]
impl Metric for TemporalCoChange {
    fn id(&self) -> &'static str {
        "temporal_co_change"
    }

    fn tier(&self) -> Tier {
        Tier::One
    }

    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult> {
        let mut partners = ctx
            .graph
            .weighted_neighbors(&ctx.file_path, EdgeKind::CoChanged, Direction::Outgoing)
            .await?;
        partners.extend(
            ctx.graph
                .weighted_neighbors(&ctx.file_path, EdgeKind::CoChanged, Direction::Incoming)
                .await?,
        );

        let strongest = partners
            .iter()
            .map(|(_, frequency)| *frequency)
            .fold(0.0_f64, f64::max);

        let band = if strongest >= self.high_at {
            Band::High
        } else if strongest >= self.medium_at {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: strongest,
            band,
            evidence: json!({ "co_change_partners": partners.len(), "strongest_frequency": strongest }),
            duration_ms: 0,
        })
    }
}

/// Test coverage ratio: the share of a file's functions reachable via a
/// `TESTS` edge. A low ratio on a file under active investigation raises
/// the escalation disjuncts in the Phase-1 baseline.
pub struct TestCoverageRatio {
    pub medium_below: f64,
    pub high_below: f64,
}

impl Default for TestCoverageRatio {
    fn default() -> Self {
        TestCoverageRatio {
            medium_below: 0.5,
            high_below: 0.2,
        }
    }
}

#[async_trait]
impl Metric for TestCoverageRatio {
    fn id(&self) -> &'static str {
        "test_coverage_ratio"
    }

    fn tier(&self) -> Tier {
        Tier::One
    }

    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult> {
        let functions = ctx
            .graph
            .neighbors(&ctx.file_path, EdgeKind::Contains, Direction::Outgoing)
            .await?;

        let mut tested = 0usize;
        for f in &functions {
            let testers = ctx
                .graph
                .neighbors(f, EdgeKind::Tests, Direction::Incoming)
                .await?;
            if !testers.is_empty() {
                tested += 1;
            }
        }

        let ratio = if functions.is_empty() {
            1.0
        } else {
            tested as f64 / functions.len() as f64
        };

        let band = if ratio < self.high_below {
            Band::High
        } else if ratio < self.medium_below {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: ratio,
            band,
            evidence: json!({ "functions": functions.len(), "tested": tested }),
            duration_ms: 0,
        })
    }
}



use async_trait::async_trait;
use coderisk_ir::{EdgeKind, NodeKind};
use coderisk_storage::Direction;
use serde_json::json;
use std::collections::HashSet;

use crate::error::Result;
use crate::registry::{Band, Metric, MetricContext, MetricResult, Tier};

/// Structural coupling: the union of a file's `IMPORTS` targets and the
/// `CALLS` targets reached from every function/class the file `CONTAINS`.
/// `CALLS` edges live at function granularity (`file.py::foo` ->
/// `callee`), so this rolls them up to the file via its `CONTAINS`
/// children rather than querying `CALLS` directly on the file id, which
/// ingestion never produces.
pub struct StructuralCoupling {
    pub medium_at: usize,
    pub high_at: usize,
}

impl Default for StructuralCoupling {
    fn default() -> Self {
        StructuralCoupling {
            medium_at: 4,
            high_at: 11,
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

        let functions = ctx
            .graph
            .neighbors(&ctx.file_path, EdgeKind::Contains, Direction::Outgoing)
            .await?;
        let mut calls = Vec::new();
        for function in &functions {
            calls.extend(
                ctx.graph
                    .neighbors(function, EdgeKind::Calls, Direction::Outgoing)
                    .await?,
            );
        }

        let union: HashSet<String> = imports.iter().chain(calls.iter()).cloned().collect();
        let count = union.len();

        let band = if count > self.high_at {
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
            medium_at: 0.5,
            high_at: 0.8,
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

        let band = if strongest > self.high_at {
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

/// Test coverage ratio: `|testers(file)| / max(1, loc(file) / 100)`, via
/// `TESTS` edges at file granularity (`TESTS | File(test) -> File(source)`)
/// and the file's own `loc` attribute recorded at ingestion.
pub struct TestCoverageRatio {
    pub medium_below: f64,
    pub high_below: f64,
}

impl Default for TestCoverageRatio {
    fn default() -> Self {
        TestCoverageRatio {
            medium_below: 0.6,
            high_below: 0.3,
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
        let testers = ctx
            .graph
            .neighbors(&ctx.file_path, EdgeKind::Tests, Direction::Incoming)
            .await?;

        let loc = ctx
            .graph
            .node(NodeKind::File, &ctx.file_path)
            .await?
            .and_then(|n| n.attrs.get("loc").and_then(|v| v.as_u64()))
            .unwrap_or(0);

        let denominator = (loc as f64 / 100.0).max(1.0);
        let ratio = testers.len() as f64 / denominator;

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
            evidence: json!({ "testers": testers.len(), "loc": loc }),
            duration_ms: 0,
        })
    }
}

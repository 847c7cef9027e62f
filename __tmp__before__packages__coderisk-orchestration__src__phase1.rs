use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use coderisk_metrics::{Band, MetricContext, MetricRegistry, MetricResult, Tier};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineResult {
    pub file_path: String,
    pub results: Vec<MetricResult>,
    pub max_band: Band,
    pub escalate: bool,
    pub timed_out: bool,
}

/// Runs every Tier 1 metric against one changed file and decides whether
/// it escalates to Phase-2 investigation. `escalate` is true when any of:
/// the max band is `High`, two or more metrics land in `Medium`, or the
/// file has no test coverage at all.
pub struct BaselineEngine {
    pub registry: Arc<MetricRegistry>,
    pub timeout: Duration,
}

impl BaselineEngine {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        BaselineEngine {
            registry,
            timeout: crate::ingest::DEFAULT_STAGE_TIMEOUT,
        }
    }

    pub async fn evaluate(&self, ctx: &MetricContext) -> BaselineResult {
        let metrics = self.registry.tier(Tier::One);
        let mut results = Vec::new();
        let mut timed_out = false;

        for metric in &metrics {
            match tokio::time::timeout(self.timeout, self.registry.compute(metric, ctx)).await {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(e)) => warn!(metric = metric.id(), error = %e, "metric computation failed"),
                Err(_) => {
                    timed_out = true;
                    warn!(metric = metric.id(), "metric timed out, continuing with partial results");
                }
            }
        }

        let max_band = results.iter().map(|r| r.band).max().unwrap_or(Band::Low);
        let medium_count = results.iter().filter(|r| r.band == Band::Medium).count();
        let no_coverage = results
            .iter()
            .any(|r| r.metric_id == "test_coverage_ratio" && r.value == 0.0);

        let escalate = max_band == Band::High || medium_count >= 2 || no_coverage;

        BaselineResult {
            file_path: ctx.file_path.clone(),
            results,
            max_band,
            escalate,
            timed_out,
        }
    }
}



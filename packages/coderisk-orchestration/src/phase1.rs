use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use coderisk_ir::ModificationKind;
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
/// any Tier 1 metric is HIGH; a `NEW_FUNCTION`/`NEW_CLASS` is present and
/// the file-level band is at least MEDIUM; or the test coverage ratio is
/// HIGH (low coverage) and the modification kinds include any `NEW_*`/
/// `MODIFIED_*`.
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

    pub async fn evaluate(&self, ctx: &MetricContext, kinds: &[ModificationKind]) -> BaselineResult {
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

        let any_tier1_high = results.iter().any(|r| r.band == Band::High);
        let new_symbol_present = kinds.iter().any(|k| k.is_new_symbol());
        let band_at_least_medium = max_band >= Band::Medium;
        let coverage_high = results
            .iter()
            .any(|r| r.metric_id == "test_coverage_ratio" && r.band == Band::High);
        let touches_new_or_modified = kinds.iter().any(|k| k.is_new_or_modified());

        let escalate = any_tier1_high
            || (new_symbol_present && band_at_least_medium)
            || (coverage_high && touches_new_or_modified);

        BaselineResult {
            file_path: ctx.file_path.clone(),
            results,
            max_band,
            escalate,
            timed_out,
        }
    }
}

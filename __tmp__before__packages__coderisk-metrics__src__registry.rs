use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use coderisk_storage::{GraphStore, IncidentStore};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Risk band a metric's value falls into. Bands are metric-specific
/// thresholds; see each `Metric` impl for its own cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    Low,
    Medium,
    High,
}

/// A metric's tier: Tier 1 metrics run on every Phase-1 baseline pass and
/// must stay cheap; Tier 2 metrics are reserved for Phase-2 investigation
/// hops, where a slower, richer signal is affordable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    One,
    Two,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric_id: String,
    pub value: f64,
    pub band: Band,
    pub evidence: serde_json::Value,
    pub duration_ms: u64,
}

/// Shared context every metric computes against.
pub struct MetricContext {
    pub graph: Arc<dyn GraphStore>,
    pub incidents: Arc<dyn IncidentStore>,
    pub file_path: String,
}

#[async_trait]
pub trait Metric: Send + Sync {
    fn id(&self) -> &'static str;
    fn tier(&self) -> Tier;
    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult>;
}

/// Cache key: `(metric-id, file-path, graph-content-hash)`. A 15-minute TTL
/// bounds how long a metric result survives graph content it was computed
/// against going stale without a new ingestion run invalidating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    metric_id: &'static str,
    file_path: String,
    content_hash: String,
}

pub struct MetricRegistry {
    metrics: Vec<Arc<dyn Metric>>,
    cache: Cache<CacheKey, MetricResult>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        MetricRegistry {
            metrics: Vec::new(),
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(15 * 60))
                .build(),
        }
    }

    pub fn register(&mut self, metric: Arc<dyn Metric>) {
        self.metrics.push(metric);
    }

    pub fn tier(&self, tier: Tier) -> Vec<Arc<dyn Metric>> {
        self.metrics
            .iter()
            .filter(|m| m.tier() == tier)
            .cloned()
            .collect()
    }

    /// Computes one metric, serving a cached value when the graph content
    /// hash the cache entry was computed against still matches.
    pub async fn compute(&self, metric: &Arc<dyn Metric>, ctx: &MetricContext) -> Result<MetricResult> {
        let content_hash = ctx.graph.content_hash().await?;
        let key = CacheKey {
            metric_id: metric.id(),
            file_path: ctx.file_path.clone(),
            content_hash,
        };

        if let Some(cached) = self.cache.get(&key) {
            debug!(metric = metric.id(), file = %ctx.file_path, "metric cache hit");
            return Ok(cached);
        }

        let start = Instant::now();
        let mut result = metric.compute(ctx).await?;
        result.duration_ms = start.elapsed().as_millis() as u64;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}



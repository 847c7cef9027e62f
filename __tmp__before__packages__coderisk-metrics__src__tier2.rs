use async_trait::async_trait;
use serde_json::json;

use coderisk_git::{GitHistoryAnalyzer, DEFAULT_MIN_FREQUENCY, DEFAULT_WINDOW_DAYS};

use crate::error::Result;
use crate::registry::{Band, Metric, MetricContext, MetricResult, Tier};

/// Ownership/churn: commit frequency and unique-author count for a file
/// over the history window. Reserved for Phase-2 hops — it shells out to
/// `git2` history walking, too slow to run on every Phase-1 pass.
pub struct OwnershipChurn {
    pub repo_path: std::path::PathBuf,
}

#[async_trait]
impl Metric for OwnershipChurn {
    fn id(&self) -> &'static str {
        "ownership_churn"
    }

    fn tier(&self) -> Tier {
        Tier::Two
    }

    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult> {
        let repo_path = self.repo_path.clone();
        let file_path = ctx.file_path.clone();

        let report = tokio::task::spawn_blocking(move || {
            let analyzer = GitHistoryAnalyzer::open(&repo_path)?;
            analyzer.analyze(DEFAULT_WINDOW_DAYS, DEFAULT_MIN_FREQUENCY)
        })
        .await
        .map_err(|e| crate::error::MetricError::Timeout(e.to_string()))?
        .unwrap_or_default();

        let touches = *report.file_touches.get(&file_path).unwrap_or(&0);
        let authors: std::collections::HashSet<_> = report
            .commits
            .iter()
            .filter(|c| c.files.contains(&file_path))
            .map(|c| c.author_email.clone())
            .collect();

        let churn_rate = touches as f64 / (DEFAULT_WINDOW_DAYS as f64 / 30.0);

        let band = if churn_rate >= 4.0 || authors.len() >= 4 {
            Band::High
        } else if churn_rate >= 1.5 || authors.len() >= 2 {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: churn_rate,
            band,
            evidence: json!({ "touches": touches, "unique_authors": authors.len() }),
            duration_ms: 0,
        })
    }
}

/// Incident similarity: how closely this file's path and symbols match
/// historical incident reports. A strong hit means a past production
/// incident touched code shaped like this diff.
pub struct IncidentSimilarity {
    pub high_score: f32,
    pub medium_score: f32,
}

impl Default for IncidentSimilarity {
    fn default() -> Self {
        IncidentSimilarity {
            high_score: 8.0,
            medium_score: 3.0,
        }
    }
}

#[async_trait]
impl Metric for IncidentSimilarity {
    fn id(&self) -> &'static str {
        "incident_similarity"
    }

    fn tier(&self) -> Tier {
        Tier::Two
    }

    async fn compute(&self, ctx: &MetricContext) -> Result<MetricResult> {
        let query = ctx.file_path.replace(['/', '.', '_'], " ");
        let hits = ctx.incidents.search(&query, 5).await?;
        let top_score = hits.first().map(|h| h.score).unwrap_or(0.0);

        let band = if top_score >= self.high_score {
            Band::High
        } else if top_score >= self.medium_score {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: top_score as f64,
            band,
            evidence: json!({
                "matches": hits.iter().map(|h| h.incident.id.clone()).collect::<Vec<_>>(),
            }),
            duration_ms: 0,
        })
    }
}



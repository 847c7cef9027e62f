use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;

use coderisk_git::{GitHistoryAnalyzer, DEFAULT_MIN_FREQUENCY, DEFAULT_WINDOW_DAYS};

use crate::error::Result;
use crate::registry::{Band, Metric, MetricContext, MetricResult, Tier};

/// Window (in days) used to pick the primary owner (most commits within
/// the window) and distinguish it from the previous owner (the 31-90 day
/// window just before it).
const PRIMARY_WINDOW_DAYS: i64 = 30;
const PREVIOUS_WINDOW_DAYS: i64 = 90;
const TRANSITION_WINDOW_DAYS: i64 = 30;

/// Ownership/churn: raw commit count over the history window, and whether
/// ownership recently transitioned from one primary author to another.
/// Reserved for Phase-2 hops -- it walks `git2` history, too slow to run
/// on every Phase-1 pass.
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
            analyzer.analyze(DEFAULT_WINDOW_DAYS, DEFAULT_MIN_FREQUENCY, coderisk_git::DEFAULT_MAX_FILES_PER_COMMIT)
        })
        .await
        .map_err(|e| crate::error::MetricError::Timeout(e.to_string()))?
        .unwrap_or_default();

        let now = Utc::now();
        let touching: Vec<_> = report
            .commits
            .iter()
            .filter(|c| c.files.iter().any(|f| f.path == file_path))
            .collect();

        let commit_count = touching.len();

        let mut primary_counts: HashMap<&str, u32> = HashMap::new();
        let mut previous_counts: HashMap<&str, u32> = HashMap::new();
        for commit in &touching {
            let age_days = (now - commit.time).num_days();
            if age_days <= PRIMARY_WINDOW_DAYS {
                *primary_counts.entry(commit.author_email.as_str()).or_insert(0) += 1;
            } else if age_days <= PREVIOUS_WINDOW_DAYS {
                *previous_counts.entry(commit.author_email.as_str()).or_insert(0) += 1;
            }
        }

        let primary_owner = primary_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(author, _)| author.to_string());
        let previous_owner = previous_counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(author, _)| author.to_string());

        let days_since_transition = touching
            .iter()
            .filter(|c| Some(c.author_email.as_str()) == primary_owner.as_deref())
            .map(|c| (now - c.time).num_days())
            .min();

        let transitioned_recently = primary_owner.is_some()
            && previous_owner.is_some()
            && primary_owner != previous_owner
            && days_since_transition.map(|d| d <= TRANSITION_WINDOW_DAYS).unwrap_or(false);

        let band = if transitioned_recently || commit_count > 10 {
            Band::High
        } else if commit_count >= 5 {
            Band::Medium
        } else {
            Band::Low
        };

        Ok(MetricResult {
            metric_id: self.id().to_string(),
            value: commit_count as f64,
            band,
            evidence: json!({
                "commit_count": commit_count,
                "primary_owner": primary_owner,
                "previous_owner": previous_owner,
                "days_since_transition": days_since_transition,
                "transitioned_recently": transitioned_recently,
            }),
            duration_ms: 0,
        })
    }
}

/// Incident similarity: how closely this file's path and symbols match
/// historical incident reports. High when the top hit's score is more
/// than double the median score of the result set -- a sharp outlier
/// rather than a generally-relevant result set.
#[derive(Default)]
pub struct IncidentSimilarity;

fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
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
        let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
        let top_score = scores.first().copied().unwrap_or(0.0);
        let median_score = median(&scores);

        // The outlier test needs a second point to compare the top hit
        // against; a lone hit has no median to be an outlier relative to,
        // but still means the file matched the only incident on record.
        let band = if scores.is_empty() {
            Band::Low
        } else if scores.len() == 1 {
            Band::Medium
        } else if top_score > 2.0 * median_score {
            Band::High
        } else if top_score > median_score {
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
                "median_score": median_score,
            }),
            duration_ms: 0,
        })
    }
}

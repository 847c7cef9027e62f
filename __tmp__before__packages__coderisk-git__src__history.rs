use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Repository, Sort};
use tracing::{debug, warn};

use coderisk_ir::{Edge, EdgeKind, Node, NodeKind};

use crate::error::{GitError, Result};

/// Default history window, matching the analyzer's "recent, not unbounded
/// history" contract.
pub const DEFAULT_WINDOW_DAYS: i64 = 90;

/// Default `CO_CHANGED` pruning threshold; pairs below this frequency are
/// dropped rather than stored, per the pruning step of the algorithm.
pub const DEFAULT_MIN_FREQUENCY: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub sha: String,
    pub author_email: String,
    pub author_name: String,
    pub time: DateTime<Utc>,
    pub files: Vec<String>,
    pub is_merge: bool,
}

#[derive(Debug, Clone)]
pub struct CoChange {
    pub a: String,
    pub b: String,
    pub co_count: u32,
    pub frequency: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryReport {
    pub commits: Vec<CommitInfo>,
    pub file_touches: HashMap<String, u32>,
    pub co_changes: Vec<CoChange>,
}

impl HistoryReport {
    /// Renders the mined history as `AUTHORED`/`MODIFIES`/`CO_CHANGED`
    /// graph nodes and edges, ready for the property graph store.
    pub fn to_graph(&self) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        let mut seen_authors = HashSet::new();

        for commit in &self.commits {
            nodes.push(
                Node::new(NodeKind::Commit, commit.sha.clone())
                    .with_attr("timestamp", commit.time.to_rfc3339())
                    .with_attr("is_merge", commit.is_merge),
            );
            if seen_authors.insert(commit.author_email.clone()) {
                nodes.push(
                    Node::new(NodeKind::Developer, commit.author_email.clone())
                        .with_attr("name", commit.author_name.clone()),
                );
            }
            edges.push(Edge::new(
                EdgeKind::Authored,
                commit.author_email.clone(),
                commit.sha.clone(),
            ));
            for file in &commit.files {
                edges.push(Edge::new(EdgeKind::Modifies, commit.sha.clone(), file.clone()));
            }
        }

        for cc in &self.co_changes {
            edges.push(
                Edge::new(EdgeKind::CoChanged, cc.a.clone(), cc.b.clone())
                    .with_attr("frequency", cc.frequency)
                    .with_attr("co_count", cc.co_count),
            );
        }

        (nodes, edges)
    }
}

/// `CO_CHANGED` frequency over the union of commits touching either
/// endpoint (invariant I2): `co_count / (touches_a + touches_b - co_count)`.
/// Returns `None` when the union is zero, which only happens if both
/// touch counts are zero -- a pair that was never actually observed.
fn co_change_frequency(touches_a: u32, touches_b: u32, co_count: u32) -> Option<f64> {
    let union = touches_a + touches_b - co_count;
    if union == 0 {
        return None;
    }
    Some(co_count as f64 / union as f64)
}

/// Mines first-parent commit history for churn and co-change signals.
///
/// Merge commits are diffed against their first parent only (per the
/// analyzer's merge-commit resolution), so file changes introduced purely
/// by merging in another branch are not double-counted against history that
/// already walked that branch.
pub struct GitHistoryAnalyzer {
    repo: Repository,
}

impl GitHistoryAnalyzer {
    pub fn open(repo_path: &Path) -> Result<Self> {
        let repo = Repository::discover(repo_path)
            .map_err(|_| GitError::NotARepository(repo_path.display().to_string()))?;
        Ok(GitHistoryAnalyzer { repo })
    }

    pub fn analyze(&self, window_days: i64, min_frequency: f64) -> Result<HistoryReport> {
        let cutoff = Utc::now() - chrono::Duration::days(window_days);

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME)?;
        revwalk.push_head()?;

        let mut commits = Vec::new();
        let mut file_touches: HashMap<String, u32> = HashMap::new();
        let mut co_counts: HashMap<(String, String), u32> = HashMap::new();

        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            let commit_time = DateTime::from_timestamp(commit.time().seconds(), 0)
                .unwrap_or_else(Utc::now);
            if commit_time < cutoff {
                // Commits are walked newest-first; once we're past the
                // window there is nothing older worth visiting.
                break;
            }

            let parent = commit.parent(0).ok();
            let is_merge = commit.parent_count() > 1;

            let old_tree = parent.as_ref().and_then(|p| p.tree().ok());
            let new_tree = commit.tree()?;
            let diff =
                self.repo
                    .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;

            let mut files = Vec::new();
            diff.foreach(
                &mut |delta, _| {
                    if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                        files.push(path.to_string_lossy().into_owned());
                    }
                    true
                },
                None,
                None,
                None,
            )?;
            files.sort();
            files.dedup();

            for f in &files {
                *file_touches.entry(f.clone()).or_insert(0) += 1;
            }
            for i in 0..files.len() {
                for j in (i + 1)..files.len() {
                    let key = (files[i].clone(), files[j].clone());
                    *co_counts.entry(key).or_insert(0) += 1;
                }
            }

            let author = commit.author();
            commits.push(CommitInfo {
                sha: oid.to_string(),
                author_email: author.email().unwrap_or("unknown").to_string(),
                author_name: author.name().unwrap_or("unknown").to_string(),
                time: commit_time,
                files,
                is_merge,
            });
        }

        debug!(commits = commits.len(), "walked commit history window");

        let mut co_changes = Vec::new();
        for ((a, b), co_count) in co_counts {
            let touches_a = *file_touches.get(&a).unwrap_or(&0);
            let touches_b = *file_touches.get(&b).unwrap_or(&0);
            let Some(frequency) = co_change_frequency(touches_a, touches_b, co_count) else {
                continue;
            };
            if frequency < min_frequency {
                continue;
            }
            co_changes.push(CoChange {
                a,
                b,
                co_count,
                frequency,
            });
        }

        if commits.is_empty() {
            warn!("no commits found within history window");
        }

        Ok(HistoryReport {
            commits,
            file_touches,
            co_changes,
        })
    }
}

#[cfg(test)]
mod frequency_properties {
    use super::co_change_frequency;
    use proptest::prelude::*;

    proptest! {
        /// For every pair with a stored `CO_CHANGED` edge, frequency stays
        /// within `[0, 1]` and recomputing it from the same touch counts
        /// and `co_count` reproduces the stored value exactly.
        #[test]
        fn frequency_is_bounded_and_reproducible(
            touches_a in 1u32..1000,
            touches_b in 1u32..1000,
            co_count in 0u32..1000,
        ) {
            let co_count = co_count.min(touches_a).min(touches_b);
            let frequency = co_change_frequency(touches_a, touches_b, co_count);

            prop_assert!(frequency.is_some());
            let frequency = frequency.unwrap();
            prop_assert!((0.0..=1.0).contains(&frequency));

            let recomputed = co_change_frequency(touches_a, touches_b, co_count).unwrap();
            prop_assert!((frequency - recomputed).abs() < f64::EPSILON);
        }

        /// Two files that never co-occur (`co_count == 0`) always yield a
        /// frequency of exactly zero, never a pruned-away `None`.
        #[test]
        fn zero_co_count_yields_zero_frequency(touches_a in 1u32..1000, touches_b in 1u32..1000) {
            let frequency = co_change_frequency(touches_a, touches_b, 0).unwrap();
            prop_assert_eq!(frequency, 0.0);
        }
    }
}



use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use coderisk_git::GitHistoryAnalyzer;
use coderisk_ir::{GraphBuilder, Language};
use coderisk_storage::{GraphStore, Incident, IncidentStore};

use crate::error::Result;

/// A single ingested incident record, as produced by an external issue/PR
/// export. Live tracker integration is an external collaborator; this
/// trait is the seam a future adapter plugs into.
pub trait IncidentSource: Send + Sync {
    fn incidents(&self) -> Result<Vec<Incident>>;
}

/// Reads incidents from a JSON-lines export file (`{id,title,body,labels,
/// created_ts,closed_ts}` per line).
pub struct JsonFileIncidentSource {
    pub path: PathBuf,
}

impl IncidentSource for JsonFileIncidentSource {
    fn incidents(&self) -> Result<Vec<Incident>> {
        let content = std::fs::read_to_string(&self.path)?;
        let mut out = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Incident>(line) {
                Ok(incident) => out.push(incident),
                Err(e) => warn!(error = %e, "skipping malformed incident record"),
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub commits_walked: usize,
    pub co_change_edges: usize,
    pub incidents_ingested: usize,
    pub duration_ms: u64,
}

/// Drives the three-layer ingestion pipeline in the mandated order --
/// AST parsing (layer 1), git history mining (layer 2), then incident
/// ingestion (layer 3) -- against a single repository checkout.
pub struct IngestionOrchestrator {
    pub graph: Arc<dyn GraphStore>,
    pub incidents: Arc<dyn IncidentStore>,
}

impl IngestionOrchestrator {
    pub fn new(graph: Arc<dyn GraphStore>, incidents: Arc<dyn IncidentStore>) -> Self {
        IngestionOrchestrator { graph, incidents }
    }

    pub async fn ingest_repository(
        &self,
        repo_root: &Path,
        history_window_days: i64,
        min_co_change_frequency: f64,
        incident_source: Option<&dyn IncidentSource>,
    ) -> Result<IngestStats> {
        let job_id = Uuid::new_v4();
        let start = Instant::now();
        info!(job_id = %job_id, repo = %repo_root.display(), "starting ingestion job");
        let mut state = JobState::Running;

        let mut stats = IngestStats::default();

        // Layer 1: AST parse every tracked, non-vendor source file.
        let files = enumerate_source_files(repo_root);
        for path in &files {
            let rel = path
                .strip_prefix(repo_root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            let Some(language) = Language::from_path(path) else {
                stats.files_skipped += 1;
                continue;
            };
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(_) => {
                    stats.files_skipped += 1;
                    continue;
                }
            };
            match GraphBuilder::build_file(&rel, language, &source) {
                Ok(file_graph) => {
                    self.graph.upsert_nodes(&file_graph.nodes).await?;
                    self.graph.upsert_edges(&file_graph.edges).await?;
                    stats.files_parsed += 1;
                }
                Err(e) => {
                    warn!(file = %rel, error = %e, "skipping file after parse failure");
                    stats.files_skipped += 1;
                }
            }
        }

        // Layer 2: git history, run only after layer 1 has populated the
        // file/function nodes that CO_CHANGED/AUTHORED/MODIFIES attach to.
        if let Ok(analyzer) = GitHistoryAnalyzer::open(repo_root) {
            match analyzer.analyze(history_window_days, min_co_change_frequency) {
                Ok(report) => {
                    stats.commits_walked = report.commits.len();
                    stats.co_change_edges = report.co_changes.len();
                    let (nodes, edges) = report.to_graph();
                    self.graph.upsert_nodes(&nodes).await?;
                    self.graph.upsert_edges(&edges).await?;
                }
                Err(e) => warn!(error = %e, "git history mining failed, continuing without it"),
            }
        } else {
            warn!("repository has no git history, skipping layer 2");
        }

        // Layer 3: incident ingestion, run last so AFFECTS matching can see
        // the full file/function graph.
        if let Some(source) = incident_source {
            match source.incidents() {
                Ok(incidents) => {
                    for incident in &incidents {
                        self.incidents.upsert(incident).await?;
                    }
                    stats.incidents_ingested = incidents.len();
                }
                Err(e) => warn!(error = %e, "incident ingestion failed, continuing without it"),
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        state = JobState::Completed;
        info!(job_id = %job_id, ?state, stats.files_parsed, "ingestion job finished");
        Ok(stats)
    }
}

/// Gitignore-aware file walk, skipping `.git`, vendor directories, and
/// binary/non-source files -- the same filtering contract as the AST
/// parser layer's "skips binary files, vendor directories, and `.git`"
/// clause.
fn enumerate_source_files(root: &Path) -> Vec<PathBuf> {
    const VENDOR_DIRS: &[&str] = &[
        "vendor", "node_modules", "dist", "build", ".git", "target", "__pycache__",
    ];

    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                let name = entry.file_name().to_string_lossy();
                return !VENDOR_DIRS.contains(&name.as_ref());
            }
            true
        })
        .build();

    for entry in walker.flatten() {
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.into_path());
        }
    }
    files
}

/// Keeps the timeout budget derived consistently across callers: the
/// default per-stage deadline before a stage's result is treated as
/// partial rather than complete.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_millis(500);



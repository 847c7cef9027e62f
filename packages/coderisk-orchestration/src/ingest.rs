use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use coderisk_git::GitHistoryAnalyzer;
use coderisk_ir::{is_test_path, Edge, EdgeKind, GraphBuilder, Language};
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
        max_files_per_commit: usize,
        incident_source: Option<&dyn IncidentSource>,
    ) -> Result<IngestStats> {
        let job_id = Uuid::new_v4();
        let start = Instant::now();
        info!(job_id = %job_id, repo = %repo_root.display(), "starting ingestion job");
        let mut state = JobState::Running;

        let mut stats = IngestStats::default();

        // Layer 1: AST parse every tracked, non-vendor source file. Every
        // file is parsed and held in memory before any edge touching
        // another file is resolved, since IMPORTS/TESTS resolution needs
        // the full set of repo-relative paths to match against.
        let files = enumerate_source_files(repo_root);
        let mut parsed: Vec<(String, coderisk_ir::FileGraph)> = Vec::new();
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
                    stats.files_parsed += 1;
                    parsed.push((rel, file_graph));
                }
                Err(e) => {
                    warn!(file = %rel, error = %e, "skipping file after parse failure");
                    stats.files_skipped += 1;
                }
            }
        }

        let known_files: HashSet<String> = parsed.iter().map(|(rel, _)| rel.clone()).collect();

        let mut all_nodes = Vec::new();
        let mut all_edges = Vec::new();
        for (rel, file_graph) in &parsed {
            all_nodes.extend(file_graph.nodes.clone());
            for edge in &file_graph.edges {
                if edge.kind == EdgeKind::Imports {
                    match resolve_import_target(rel, &edge.to, &known_files) {
                        Some(target) => all_edges.push(Edge::new(EdgeKind::Imports, rel.clone(), target)),
                        None => debug_dropped_import(rel, &edge.to),
                    }
                } else {
                    all_edges.push(edge.clone());
                }
            }
        }
        all_edges.extend(infer_tests_edges(&known_files));

        self.graph.upsert_nodes(&all_nodes).await?;
        self.graph.upsert_edges(&all_edges).await?;

        // Layer 2: git history, run only after layer 1 has populated the
        // file/function nodes that CO_CHANGED/AUTHORED/MODIFIES attach to.
        if let Ok(analyzer) = GitHistoryAnalyzer::open(repo_root) {
            match analyzer.analyze(history_window_days, min_co_change_frequency, max_files_per_commit) {
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

fn debug_dropped_import(importer: &str, raw_spec: &str) {
    tracing::debug!(importer, raw_spec, "dropping unresolved import");
}

/// Resolves a raw import specifier (a relative path, a dotted module
/// name, a bare package path) to a repo-relative file already known to
/// this ingestion run. Unresolvable imports are dropped entirely, per the
/// parser layer's "resolves imports to repo-local paths when possible;
/// unresolved imports are dropped" contract -- this repository has no
/// resolver for third-party/stdlib packages, so only imports that match a
/// file actually in the repo survive.
fn resolve_import_target(importer_rel: &str, raw_spec: &str, known_files: &HashSet<String>) -> Option<String> {
    const EXTENSIONS: &[&str] = &["py", "go", "ts", "tsx", "js", "jsx"];

    let importer_dir = Path::new(importer_rel).parent().unwrap_or_else(|| Path::new(""));

    let candidate_stems: Vec<PathBuf> = if raw_spec.starts_with('.') {
        // Relative import (Python `./foo`, `.foo`, `..pkg.foo`, or a JS/TS
        // `./foo`-style specifier): resolve against the importer's directory.
        let dots = raw_spec.chars().take_while(|c| *c == '.').count();
        let rest = raw_spec.trim_start_matches('.').replace('.', "/");
        let mut base = importer_dir.to_path_buf();
        for _ in 1..dots {
            base = base.parent().map(Path::to_path_buf).unwrap_or_default();
        }
        if rest.is_empty() {
            vec![base]
        } else {
            vec![base.join(rest.replace('/', std::path::MAIN_SEPARATOR_STR))]
        }
    } else if raw_spec.contains('/') {
        // Already path-shaped (Go import path, JS bare-ish path): try it
        // as-is and also as a suffix match against known files.
        vec![PathBuf::from(raw_spec)]
    } else {
        // A dotted absolute module path (Python `pkg.mod`) or a single bare
        // name; try converting dots to path separators.
        vec![PathBuf::from(raw_spec.replace('.', "/"))]
    };

    for stem in &candidate_stems {
        let stem_str = stem.to_string_lossy().replace('\\', "/");
        for ext in EXTENSIONS {
            let candidate = format!("{stem_str}.{ext}");
            if known_files.contains(&candidate) {
                return Some(candidate);
            }
            let index_candidate = format!("{stem_str}/index.{ext}");
            if known_files.contains(&index_candidate) {
                return Some(index_candidate);
            }
        }
        let init_candidate = format!("{stem_str}/__init__.py");
        if known_files.contains(&init_candidate) {
            return Some(init_candidate);
        }
        // Suffix match: a domain-qualified Go import path like
        // `github.com/org/repo/pkg/foo` should resolve against a known file
        // ending in `pkg/foo.go`, not a file whose path literally contains
        // the domain/org/repo prefix. Try progressively shorter trailing
        // path-segment suffixes of the spec until one matches.
        let components: Vec<&str> = stem_str.split('/').filter(|c| !c.is_empty()).collect();
        for start in 0..components.len() {
            let suffix = components[start..].join("/");
            if let Some(hit) = known_files.iter().find(|f| {
                EXTENSIONS.iter().any(|ext| {
                    let candidate = format!("{suffix}.{ext}");
                    f.as_str() == candidate || f.ends_with(&format!("/{candidate}"))
                })
            }) {
                return Some(hit.clone());
            }
        }
    }

    None
}

/// Heuristically pairs test files with the source file they most likely
/// cover, emitting `TESTS | File(test) -> File(source)` edges so
/// `test_coverage_ratio` has something to read.
fn infer_tests_edges(known_files: &HashSet<String>) -> Vec<Edge> {
    let mut edges = Vec::new();
    for test_file in known_files.iter().filter(|f| is_test_path(f)) {
        if let Some(source) = candidate_source_for_test(test_file, known_files) {
            edges.push(Edge::new(EdgeKind::Tests, test_file.clone(), source));
        }
    }
    edges
}

fn candidate_source_for_test(test_path: &str, known_files: &HashSet<String>) -> Option<String> {
    let path = Path::new(test_path);
    let dir = path.parent();
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let ext = path.extension()?.to_string_lossy().to_string();

    let candidate_stems: Vec<String> = [
        stem.strip_suffix("_test").map(str::to_string),
        stem.strip_prefix("test_").map(str::to_string),
        stem.strip_suffix(".test").map(str::to_string),
        stem.strip_suffix(".spec").map(str::to_string),
    ]
    .into_iter()
    .flatten()
    .collect();

    for candidate_stem in candidate_stems {
        let candidate_path = match dir {
            Some(d) if !d.as_os_str().is_empty() => {
                format!("{}/{}.{}", d.to_string_lossy(), candidate_stem, ext)
            }
            _ => format!("{candidate_stem}.{ext}"),
        };
        if known_files.contains(&candidate_path) {
            return Some(candidate_path);
        }
    }
    None
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

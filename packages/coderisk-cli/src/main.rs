//! `coderisk` -- pre-commit risk assessment for source repositories.
//!
//! This binary is intentionally thin: it resolves a target repository and
//! changed-file set, then delegates to `coderisk-orchestration` for every
//! algorithmic decision. Argument parsing, config loading, and git-hook
//! installation are the only concerns that live here.

mod classify;
mod config;
mod render;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::info;

use coderisk_ir::ModificationKind;
use coderisk_orchestration::{
    IngestionOrchestrator, MultiFileCoordinator, OpenAiCompatibleClient,
};
use coderisk_storage::{SqliteGraphStore, SqliteIncidentStore};

use classify::classify_file;
use config::{resolve_api_key, Preset, RiskConfig};
use render::Verbosity;

#[derive(Parser)]
#[command(name = "coderisk", version, about = "Pre-commit risk assessment for source repositories")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a repository's current state into the local graph/incident stores.
    Init {
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "balanced")]
        preset: Preset,
    },
    /// Assess the risk of a change: the working tree (default), a ref like
    /// `HEAD`/`HEAD~3`/a commit sha, a `A..B` range, or explicit file paths.
    Check {
        target: Option<String>,
        #[arg(long)]
        repo: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "balanced")]
        preset: Preset,
        #[arg(long, value_enum, default_value = "normal")]
        verbosity: Verbosity,
        #[arg(long)]
        json: bool,
    },
    /// Manage the git pre-commit hook.
    Hook {
        #[command(subcommand)]
        action: HookCommands,
    },
}

#[derive(Subcommand)]
enum HookCommands {
    /// Install `coderisk check` as this repository's pre-commit hook.
    Install {
        #[arg(long)]
        repo: Option<PathBuf>,
    },
}

fn store_paths(repo_root: &Path) -> (PathBuf, PathBuf) {
    let dir = repo_root.join(".coderisk");
    (dir.join("graph.sqlite"), dir.join("incidents.sqlite"))
}

async fn run_init(repo: Option<PathBuf>, preset: Preset) -> anyhow::Result<()> {
    let repo_root = repo.unwrap_or_else(|| PathBuf::from("."));
    let config = RiskConfig::load(preset, Some(&repo_root.join(".coderisk.toml")))?;

    let (graph_path, incidents_path) = store_paths(&repo_root);
    std::fs::create_dir_all(graph_path.parent().unwrap())?;

    let graph = Arc::new(SqliteGraphStore::open(&graph_path)?);
    let incidents = Arc::new(SqliteIncidentStore::open(&incidents_path)?);
    let orchestrator = IngestionOrchestrator::new(graph, incidents);

    let stats = orchestrator
        .ingest_repository(
            &repo_root,
            config.history_window_days,
            config.min_co_change_frequency,
            config.max_files_per_commit,
            None,
        )
        .await?;

    info!(?stats, "ingestion complete");
    println!(
        "ingested {} files, {} commits, {} co-change edges",
        stats.files_parsed, stats.commits_walked, stats.co_change_edges
    );
    Ok(())
}

/// What `check`'s positional argument resolved to: nothing (working tree
/// vs `HEAD`), a single ref/sha to diff against its parent, a `A..B` range,
/// or an explicit list of file paths to restrict the check to.
enum CheckTarget {
    WorkingTree,
    SingleRef(String),
    Range(String, String),
    ExplicitPaths(Vec<String>),
}

/// A ref-shaped positional: `HEAD`, `HEAD~N`, a 7-40 hex sha, or an
/// `A..B` range -- anything else is treated as an explicit file path.
fn looks_like_ref(s: &str) -> bool {
    if s == "HEAD" {
        return true;
    }
    if let Some(rest) = s.strip_prefix("HEAD~") {
        return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit());
    }
    if s.contains("..") {
        return true;
    }
    let len = s.len();
    (7..=40).contains(&len) && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn resolve_check_target(target: Option<String>) -> CheckTarget {
    let Some(target) = target else {
        return CheckTarget::WorkingTree;
    };
    if let Some((a, b)) = target.split_once("..") {
        return CheckTarget::Range(a.to_string(), b.to_string());
    }
    if looks_like_ref(&target) {
        return CheckTarget::SingleRef(target);
    }
    CheckTarget::ExplicitPaths(vec![target])
}

/// Resolves a revspec (`HEAD`, `HEAD~N`, a sha, a branch name) to its
/// commit's tree and its first parent's tree, for a single-commit diff.
fn resolve_commit_trees<'repo>(
    repo: &'repo git2::Repository,
    revspec: &str,
) -> anyhow::Result<(Option<git2::Tree<'repo>>, git2::Tree<'repo>)> {
    let object = repo.revparse_single(revspec)?;
    let commit = object.peel_to_commit()?;
    let new_tree = commit.tree()?;
    let old_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    Ok((old_tree, new_tree))
}

fn diff_paths_and_contents(
    repo: &git2::Repository,
    old_tree: Option<&git2::Tree>,
    new_tree: &git2::Tree,
) -> anyhow::Result<Vec<(String, Option<String>, Option<String>)>> {
    let diff = repo.diff_tree_to_tree(old_tree, Some(new_tree), None)?;
    let mut out = Vec::new();
    for idx in 0..diff.deltas().len() {
        let delta = diff.get_delta(idx).expect("idx within deltas().len()");
        let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
            continue;
        };
        let path = path.to_string_lossy().into_owned();
        let before = blob_text_at(repo, old_tree, &path);
        let after = blob_text_at(repo, Some(new_tree), &path);
        out.push((path, before, after));
    }
    Ok(out)
}

fn blob_text_at(repo: &git2::Repository, tree: Option<&git2::Tree>, rel_path: &str) -> Option<String> {
    let tree = tree?;
    let entry = tree.get_path(Path::new(rel_path)).ok()?;
    let blob = entry.to_object(repo).ok()?.peel_to_blob().ok()?;
    String::from_utf8(blob.content().to_vec()).ok()
}

/// Resolves the set of changed files and their before/after content for
/// the target the `check` invocation resolved to.
fn resolve_changed_files(
    repo_root: &Path,
    target: &CheckTarget,
) -> anyhow::Result<Vec<(String, Option<String>, Option<String>)>> {
    let repo = git2::Repository::discover(repo_root)?;

    match target {
        CheckTarget::WorkingTree => {
            let mut opts = git2::StatusOptions::new();
            opts.include_untracked(false);
            let statuses = repo.statuses(Some(&mut opts))?;
            let mut out = Vec::new();
            for entry in statuses.iter() {
                let Some(path) = entry.path() else { continue };
                let path = path.to_string();
                let after = std::fs::read_to_string(repo_root.join(&path)).ok();
                let before = (|| {
                    let tree = repo.head().ok()?.peel_to_tree().ok()?;
                    blob_text_at(&repo, Some(&tree), &path)
                })();
                out.push((path, before, after));
            }
            Ok(out)
        }
        CheckTarget::SingleRef(rev) => {
            let (old_tree, new_tree) = resolve_commit_trees(&repo, rev)?;
            diff_paths_and_contents(&repo, old_tree.as_ref(), &new_tree)
        }
        CheckTarget::Range(a, b) => {
            let old_tree = repo.revparse_single(a)?.peel_to_tree()?;
            let new_tree = repo.revparse_single(b)?.peel_to_tree()?;
            diff_paths_and_contents(&repo, Some(&old_tree), &new_tree)
        }
        CheckTarget::ExplicitPaths(paths) => {
            let mut out = Vec::new();
            for path in paths {
                let after = std::fs::read_to_string(repo_root.join(path)).ok();
                let before = (|| {
                    let tree = repo.head().ok()?.peel_to_tree().ok()?;
                    blob_text_at(&repo, Some(&tree), path)
                })();
                out.push((path.clone(), before, after));
            }
            Ok(out)
        }
    }
}

/// Classifies every changed file and drops the ones whose observed
/// modification kinds are ALL behaviorally inert noise (doc/config/
/// whitespace-only), so the baseline engine and investigator only spend
/// budget on changes that can plausibly affect production behavior.
fn classify_and_filter(
    changes: Vec<(String, Option<String>, Option<String>)>,
) -> (Vec<String>, HashMap<String, Vec<ModificationKind>>) {
    let mut files = Vec::new();
    let mut kinds_by_file = HashMap::new();

    for (path, before, after) in changes {
        match classify_file(&path, before.as_deref(), after.as_deref()) {
            Ok(kinds) => {
                let keep = !coderisk_ir::is_noise_only(&kinds);
                kinds_by_file.insert(path.clone(), kinds);
                if keep {
                    files.push(path);
                }
            }
            Err(_) => files.push(path),
        }
    }
    (files, kinds_by_file)
}

async fn run_check(
    target: Option<String>,
    repo: Option<PathBuf>,
    preset: Preset,
    verbosity: Verbosity,
    json: bool,
) -> anyhow::Result<i32> {
    let start = Instant::now();
    let repo_root = repo.unwrap_or_else(|| PathBuf::from("."));
    let config = RiskConfig::load(preset, Some(&repo_root.join(".coderisk.toml")))?;

    let (graph_path, incidents_path) = store_paths(&repo_root);
    if !graph_path.exists() {
        anyhow::bail!("no ingested graph found; run `coderisk init` first");
    }

    let graph = Arc::new(SqliteGraphStore::open(&graph_path)?);
    let incidents = Arc::new(SqliteIncidentStore::open(&incidents_path)?);
    let registry = Arc::new(coderisk_metrics::default_registry(repo_root.clone()));

    let check_target = resolve_check_target(target);
    let changes = resolve_changed_files(&repo_root, &check_target)?;
    if changes.is_empty() {
        println!("no changes to assess");
        return Ok(0);
    }
    let (files, modification_kinds) = classify_and_filter(changes);
    if files.is_empty() {
        println!("no behavioral changes to assess (doc/config/whitespace only)");
        return Ok(0);
    }

    let api_key = resolve_api_key()
        .ok_or_else(|| anyhow::anyhow!("no LLM API key found (set CODERISK_API_KEY or OPENAI_API_KEY)"))?;
    let llm = Arc::new(OpenAiCompatibleClient::new(
        config.llm_base_url.clone(),
        api_key,
        config.llm_model.clone(),
    ));

    let coordinator = MultiFileCoordinator::new(graph, incidents, registry, llm);
    let verdicts = coordinator.evaluate_changed_files(&files, &modification_kinds).await?;

    let duration_ms = start.elapsed().as_millis() as u64;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&render::render_json(&verdicts, &modification_kinds, duration_ms))?
        );
    } else {
        print!("{}", render::render_human(&verdicts, verbosity));
    }

    Ok(render::exit_code(&verdicts))
}

fn run_hook_install(repo: Option<PathBuf>) -> anyhow::Result<()> {
    let repo_root = repo.unwrap_or_else(|| PathBuf::from("."));
    let hooks_dir = repo_root.join(".git").join("hooks");
    if !hooks_dir.exists() {
        anyhow::bail!("{} is not a git repository", repo_root.display());
    }
    let hook_path = hooks_dir.join("pre-commit");
    let script = "#!/bin/sh\ncoderisk check || exit 1\n";
    std::fs::write(&hook_path, script)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&hook_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&hook_path, perms)?;
    }

    println!("installed pre-commit hook at {}", hook_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Init { repo, preset } => {
            run_init(repo, preset).await?;
            0
        }
        Commands::Check {
            target,
            repo,
            preset,
            verbosity,
            json,
        } => match run_check(target, repo, preset, verbosity, json).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e}");
                3
            }
        },
        Commands::Hook {
            action: HookCommands::Install { repo },
        } => {
            run_hook_install(repo)?;
            0
        }
    };

    std::process::exit(exit_code);
}

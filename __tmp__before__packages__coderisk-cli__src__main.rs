//! `coderisk` -- pre-commit risk assessment for source repositories.
//!
//! This binary is intentionally thin: it resolves a target repository and
//! changed-file set, then delegates to `coderisk-orchestration` for every
//! algorithmic decision. Argument parsing, config loading, and git-hook
//! installation are the only concerns that live here.

mod classify;
mod config;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use coderisk_orchestration::{
    IngestionOrchestrator, MultiFileCoordinator, OpenAiCompatibleClient,
};
use coderisk_storage::{SqliteGraphStore, SqliteIncidentStore};

use classify::{classify_file, ChangeKind};
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
        path: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "balanced")]
        preset: Preset,
    },
    /// Assess the risk of the currently staged/working-tree changes.
    Check {
        path: Option<PathBuf>,
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
    Install { path: Option<PathBuf> },
}

fn store_paths(repo_root: &Path) -> (PathBuf, PathBuf) {
    let dir = repo_root.join(".coderisk");
    (dir.join("graph.sqlite"), dir.join("incidents.sqlite"))
}

async fn run_init(path: Option<PathBuf>, preset: Preset) -> anyhow::Result<()> {
    let repo_root = path.unwrap_or_else(|| PathBuf::from("."));
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

/// Resolves the set of changed files as working-tree modifications against
/// `HEAD` -- the common case for a pre-commit hook, where nothing has been
/// committed yet for an explicit ref to diff against.
fn changed_files(repo_root: &Path) -> anyhow::Result<Vec<String>> {
    let repo = git2::Repository::discover(repo_root)?;
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(false);
    let statuses = repo.statuses(Some(&mut opts))?;
    let mut files = Vec::new();
    for entry in statuses.iter() {
        if let Some(path) = entry.path() {
            files.push(path.to_string());
        }
    }
    Ok(files)
}

/// Reads a changed file's `HEAD` blob (if it existed there) and its
/// current working-tree content, for the Phase-0 classifier's diff.
fn read_before_after(repo_root: &Path, rel_path: &str) -> (Option<String>, String) {
    let after = std::fs::read_to_string(repo_root.join(rel_path)).unwrap_or_default();
    let before = (|| {
        let repo = git2::Repository::discover(repo_root).ok()?;
        let tree = repo.head().ok()?.peel_to_tree().ok()?;
        let entry = tree.get_path(Path::new(rel_path)).ok()?;
        let blob = entry.to_object(&repo).ok()?.peel_to_blob().ok()?;
        String::from_utf8(blob.content().to_vec()).ok()
    })();
    (before, after)
}

/// Filters out changes the Phase-0 classifier marks as pure noise (doc,
/// config, or whitespace-only edits with no behavioral component), so the
/// baseline engine and investigator only spend budget on changes that can
/// plausibly affect production behavior.
fn filter_behavioral_changes(repo_root: &Path, files: Vec<String>) -> Vec<String> {
    files
        .into_iter()
        .filter(|path| {
            let (before, after) = read_before_after(repo_root, path);
            match classify_file(path, before.as_deref(), &after) {
                Ok(kinds) => kinds.contains(&ChangeKind::Behavioral) || kinds.contains(&ChangeKind::TestOnly),
                Err(_) => true,
            }
        })
        .collect()
}

async fn run_check(path: Option<PathBuf>, preset: Preset, verbosity: Verbosity, json: bool) -> anyhow::Result<i32> {
    let repo_root = path.unwrap_or_else(|| PathBuf::from("."));
    let config = RiskConfig::load(preset, Some(&repo_root.join(".coderisk.toml")))?;

    let (graph_path, incidents_path) = store_paths(&repo_root);
    if !graph_path.exists() {
        anyhow::bail!("no ingested graph found; run `coderisk init` first");
    }

    let graph = Arc::new(SqliteGraphStore::open(&graph_path)?);
    let incidents = Arc::new(SqliteIncidentStore::open(&incidents_path)?);
    let registry = Arc::new(coderisk_metrics::default_registry(repo_root.clone()));

    let files = changed_files(&repo_root)?;
    if files.is_empty() {
        println!("no changes to assess");
        return Ok(0);
    }
    let files = filter_behavioral_changes(&repo_root, files);
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
    let verdicts = coordinator.evaluate_changed_files(&files).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&render::render_json(&verdicts))?);
    } else {
        print!("{}", render::render_human(&verdicts, verbosity));
    }

    Ok(render::exit_code(&verdicts))
}

fn run_hook_install(path: Option<PathBuf>) -> anyhow::Result<()> {
    let repo_root = path.unwrap_or_else(|| PathBuf::from("."));
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
        Commands::Init { path, preset } => {
            run_init(path, preset).await?;
            0
        }
        Commands::Check {
            path,
            preset,
            verbosity,
            json,
        } => run_check(path, preset, verbosity, json).await?,
        Commands::Hook {
            action: HookCommands::Install { path },
        } => {
            run_hook_install(path)?;
            0
        }
    };

    std::process::exit(exit_code);
}



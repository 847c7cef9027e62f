//! Git history mining (component C3): churn, authorship, and co-change
//! signals derived from a bounded window of first-parent commit history.

pub mod error;
pub mod history;

pub use error::{GitError, Result};
pub use history::{
    CoChange, CommitInfo, FileChange, GitHistoryAnalyzer, HistoryReport,
    DEFAULT_MAX_FILES_PER_COMMIT, DEFAULT_MIN_FREQUENCY, DEFAULT_WINDOW_DAYS,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_repo_with_commits() -> TempDir {
        let dir = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .status()
                .expect("git available in test environment");
            assert!(status.success());
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "dev@example.com"]);
        run(&["config", "user.name", "Dev"]);

        std::fs::write(dir.path().join("a.go"), "package main\n").unwrap();
        std::fs::write(dir.path().join("b.go"), "package main\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "init"]);

        std::fs::write(dir.path().join("a.go"), "package main\n// changed\n").unwrap();
        std::fs::write(dir.path().join("b.go"), "package main\n// changed\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-q", "-m", "touch both"]);

        dir
    }

    #[test]
    fn mines_co_change_frequency() {
        let dir = init_repo_with_commits();
        let analyzer = GitHistoryAnalyzer::open(dir.path()).unwrap();
        let report = analyzer
            .analyze(DEFAULT_WINDOW_DAYS, 0.0, DEFAULT_MAX_FILES_PER_COMMIT)
            .expect("analysis succeeds");

        assert_eq!(report.commits.len(), 2);
        assert_eq!(report.file_touches.get("a.go"), Some(&2));
        let pair = report
            .co_changes
            .iter()
            .find(|cc| (cc.a == "a.go" && cc.b == "b.go") || (cc.a == "b.go" && cc.b == "a.go"));
        assert!(pair.is_some());
        assert_eq!(pair.unwrap().co_count, 1);
    }

    #[test]
    fn rejects_non_repository() {
        let dir = TempDir::new().unwrap();
        assert!(GitHistoryAnalyzer::open(dir.path()).is_err());
    }

    #[test]
    fn to_graph_emits_authored_and_modifies_edges() {
        let dir = init_repo_with_commits();
        let analyzer = GitHistoryAnalyzer::open(dir.path()).unwrap();
        let report = analyzer
            .analyze(DEFAULT_WINDOW_DAYS, 1.0, DEFAULT_MAX_FILES_PER_COMMIT)
            .unwrap();
        let (nodes, edges) = report.to_graph();

        assert!(nodes.iter().any(|n| n.kind == coderisk_ir::NodeKind::Developer));
        assert!(edges.iter().any(|e| e.kind == coderisk_ir::EdgeKind::Authored));
        assert!(edges.iter().any(|e| e.kind == coderisk_ir::EdgeKind::Modifies));
    }
}

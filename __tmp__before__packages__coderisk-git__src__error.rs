use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository at {0}")]
    NotARepository(String),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;



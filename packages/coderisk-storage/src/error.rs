use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("search index error: {0}")]
    Index(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("incident not found: {0}")]
    IncidentNotFound(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

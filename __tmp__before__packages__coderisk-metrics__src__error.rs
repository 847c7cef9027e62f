use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("storage error: {0}")]
    Storage(#[from] coderisk_storage::StorageError),

    #[error("metric '{0}' timed out")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, MetricError>;



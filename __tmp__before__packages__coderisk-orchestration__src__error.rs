use thiserror::Error;

/// Classifies a failure for retry purposes, the same three-way split the
/// ingestion orchestrator and the investigator both use to decide whether
/// to retry, escalate, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("ir error: {0}")]
    Ir(#[from] coderisk_ir::IrError),

    #[error("git error: {0}")]
    Git(#[from] coderisk_git::GitError),

    #[error("storage error: {0}")]
    Storage(#[from] coderisk_storage::StorageError),

    #[error("metric error: {0}")]
    Metric(#[from] coderisk_metrics::MetricError),

    #[error("stage '{0}' timed out")]
    StageTimeout(String),

    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("investigation exhausted its hop budget without reaching confidence")]
    HopBudgetExhausted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Heuristic classification, mirroring the ingestion orchestrator's own
    /// string-based categorization of upstream failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrchestratorError::StageTimeout(_) => ErrorCategory::Transient,
            OrchestratorError::Llm(_) => ErrorCategory::Transient,
            OrchestratorError::Storage(_) => ErrorCategory::Infrastructure,
            OrchestratorError::Ir(_) => ErrorCategory::Permanent,
            OrchestratorError::Git(_) => ErrorCategory::Permanent,
            OrchestratorError::Metric(_) => ErrorCategory::Transient,
            OrchestratorError::HopBudgetExhausted => ErrorCategory::Permanent,
            OrchestratorError::Io(_) => ErrorCategory::Infrastructure,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;



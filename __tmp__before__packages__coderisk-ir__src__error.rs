use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported language for {0}")]
    UnsupportedLanguage(String),

    #[error("graph build error: {0}")]
    GraphBuild(String),
}

impl IrError {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        IrError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IrError>;



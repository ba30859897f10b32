use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("record with id '{0}' already exists")]
    AlreadyExists(String),

    #[error("constraint '{constraint}' rejected field '{field}': {message}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        message: String,
    },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("document shape incompatible with storage: {0}")]
    SchemaMismatchOnWrite(String),

    #[error("cannot encode field '{field}': {message}")]
    Encoding { field: String, message: String },

    #[error("index at {} is not initialized", .0.display())]
    NotInitialized(PathBuf),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("index at {} is locked by another writer", .0.display())]
    Locked(PathBuf),

    #[error("batch flush failed: {0}")]
    FlushFailed(String),

    #[error("corrupt index data: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn encoding(field: &str, message: impl Into<String>) -> Self {
        Error::Encoding {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Errors that stem from the caller's input rather than from storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::AlreadyExists(_) | Error::ConstraintViolation { .. } | Error::Encoding { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(Error::AlreadyExists("a".into()).is_validation());
        assert!(Error::encoding("f", "bad").is_validation());
        assert!(!Error::SchemaMismatchOnWrite("x".into()).is_validation());
        assert!(!Error::NotInitialized(PathBuf::from("/tmp/x")).is_validation());
    }

    #[test]
    fn test_display_includes_field() {
        let err = Error::ConstraintViolation {
            field: "title".into(),
            constraint: "not_empty".into(),
            message: "value is empty".into(),
        };
        let text = err.to_string();
        assert!(text.contains("title"));
        assert!(text.contains("not_empty"));
    }
}

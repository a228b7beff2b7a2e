//! Errores de persistencia.
//! Mapea fallos de disco y de serde a variantes semánticas, y éstas al
//! `StoreError` que consume el pipeline de confianza.

use bim_confidence::StoreError;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("io error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("corrupt json store {path}: {message}")]
    Corrupt { path: String, message: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PersistenceError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(),
                   message: err.to_string() }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Corrupt { .. } | PersistenceError::Serialization(_) => {
                StoreError::Serialization(err.to_string())
            }
            other => StoreError::Io(other.to_string()),
        }
    }
}

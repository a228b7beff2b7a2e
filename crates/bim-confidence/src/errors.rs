//! Errores del subsistema de confianza.

use thiserror::Error;

/// Fallo de un store de revisión o feedback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store io error: {0}")] Io(String),
    #[error("store serialization error: {0}")] Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Configuración inválida o ilegible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid confidence configuration: {0}")] Invalid(String),
    #[error("cannot read confidence configuration: {0}")] Io(String),
    #[error("cannot parse confidence configuration: {0}")] Parse(String),
}

/// Error interno del pipeline de confianza.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("invalid params for {method}: {reason}")] InvalidParams { method: String, reason: String },
    #[error("confidence scorer failed: {0}")] Scorer(String),
    #[error("review item not found: {0}")] ReviewNotFound(String),
    #[error("invalid review decision: {0}")] InvalidDecision(String),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Config(#[from] ConfigError),
}

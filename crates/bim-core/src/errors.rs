//! Errores del core del orquestador.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::phase::PhaseStatus;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("workflow not found: {0}")] WorkflowNotFound(Uuid),
    #[error("phase not found: {0}")] PhaseNotFound(String),
    #[error("dependencies not satisfied for phase '{phase}': missing {}", .missing.join(", "))]
    DependenciesNotSatisfied { phase: String, missing: Vec<String> },
    #[error("validation failed: {0}")] Validation(String),
    #[error("executor error: {0}")] Executor(String),
    #[error("confidence pipeline error: {0}")] Pipeline(String),
    #[error("invalid phase catalog: {0}")] InvalidCatalog(String),
    #[error("invalid transition for phase '{phase}': {from:?} -> {to:?}")]
    InvalidTransition { phase: String, from: PhaseStatus, to: PhaseStatus },
    #[error("internal: {0}")] Internal(String),
}

/// Errores del ejecutor de construcción (una operación atómica).
#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ExecutorError {
    #[error("unknown method: {0}")] UnknownMethod(String),
    #[error("invalid params for {method}: {reason}")] InvalidParams { method: String, reason: String },
    #[error("element not found: {0}")] ElementNotFound(String),
    #[error("operation failed: {0}")] Failed(String),
    #[error("operation timed out after {0} ms")] Timeout(u64),
}

impl From<ExecutorError> for CoreEngineError {
    fn from(e: ExecutorError) -> Self {
        CoreEngineError::Executor(e.to_string())
    }
}

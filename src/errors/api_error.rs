use bim_confidence::{ConfigError, PipelineError};
use bim_core::CoreEngineError;
use bim_domain::DomainError;
use bim_persistence::PersistenceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Clasificación estable de errores expuesta como `errorKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DependencyNotSatisfied,
    Executor,
    Pipeline,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Validation",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::DependencyNotSatisfied => "DependencyNotSatisfied",
            ErrorKind::Executor => "Executor",
            ErrorKind::Pipeline => "Pipeline",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error de la frontera pública. Cada operación lo convierte en un envelope
/// `{success: false, error, errorKind}`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    DependencyNotSatisfied(String),
    #[error("executor error: {0}")]
    Executor(String),
    #[error("confidence pipeline error: {0}")]
    Pipeline(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::DependencyNotSatisfied(_) => ErrorKind::DependencyNotSatisfied,
            ApiError::Executor(_) => ErrorKind::Executor,
            ApiError::Pipeline(_) => ErrorKind::Pipeline,
            ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn missing_param(name: &str) -> Self {
        ApiError::Validation(format!("{name} is required"))
    }
}

impl From<CoreEngineError> for ApiError {
    fn from(e: CoreEngineError) -> Self {
        match e {
            CoreEngineError::WorkflowNotFound(id) => ApiError::NotFound(format!("workflow {id}")),
            CoreEngineError::PhaseNotFound(key) => ApiError::NotFound(format!("phase {key}")),
            CoreEngineError::DependenciesNotSatisfied { .. } => ApiError::DependencyNotSatisfied(e.to_string()),
            CoreEngineError::Validation(msg) => ApiError::Validation(msg),
            CoreEngineError::InvalidTransition { .. } => ApiError::Validation(e.to_string()),
            CoreEngineError::Executor(msg) => ApiError::Executor(msg),
            CoreEngineError::Pipeline(msg) => ApiError::Pipeline(msg),
            CoreEngineError::InvalidCatalog(_) | CoreEngineError::Internal(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::ReviewNotFound(id) => ApiError::NotFound(format!("review item {id}")),
            PipelineError::InvalidParams { .. } | PipelineError::InvalidDecision(_) => {
                ApiError::Validation(e.to_string())
            }
            PipelineError::Scorer(_) | PipelineError::Store(_) | PipelineError::Config(_) => {
                ApiError::Pipeline(e.to_string())
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::ValidationError(msg) | DomainError::SerializationError(msg) => ApiError::Validation(msg),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::Config(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bim_core::PhaseStatus;
    use uuid::Uuid;

    #[test]
    fn core_errors_map_to_stable_kinds() {
        let nf: ApiError = CoreEngineError::WorkflowNotFound(Uuid::nil()).into();
        assert_eq!(nf.error_kind(), ErrorKind::NotFound);

        let deps: ApiError = CoreEngineError::DependenciesNotSatisfied { phase: "Doors".into(),
                                                                          missing: vec!["Exterior Walls".into()] }.into();
        assert_eq!(deps.error_kind(), ErrorKind::DependencyNotSatisfied);
        assert!(deps.to_string().contains("Exterior Walls"));

        let transition: ApiError = CoreEngineError::InvalidTransition { phase: "Levels".into(),
                                                                         from: PhaseStatus::Completed,
                                                                         to: PhaseStatus::Skipped }.into();
        assert_eq!(transition.error_kind(), ErrorKind::Validation);
    }

    #[test]
    fn pipeline_errors_map_to_stable_kinds() {
        let missing: ApiError = PipelineError::ReviewNotFound("r-1".into()).into();
        assert_eq!(missing.error_kind(), ErrorKind::NotFound);
        let decision: ApiError = PipelineError::InvalidDecision("maybe".into()).into();
        assert_eq!(decision.error_kind(), ErrorKind::Validation);
        let scorer: ApiError = PipelineError::Scorer("boom".into()).into();
        assert_eq!(scorer.error_kind(), ErrorKind::Pipeline);
    }

    #[test]
    fn domain_errors_are_validation() {
        let e: ApiError = DomainError::ValidationError("footprint".into()).into();
        assert_eq!(e.error_kind(), ErrorKind::Validation);
        assert_eq!(e.to_string(), "validation failed: footprint");
    }
}

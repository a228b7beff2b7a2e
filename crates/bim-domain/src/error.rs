use thiserror::Error;

/// Error del dominio de edificación.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Error de validación: {0}")]
    ValidationError(String),

    #[error("Error de serialización: {0}")]
    SerializationError(String),
}

// Conversión desde serde_json::Error a DomainError
impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::SerializationError(e.to_string())
    }
}

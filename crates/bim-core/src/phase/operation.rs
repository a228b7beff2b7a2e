use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::PhaseId;
use crate::hashing::operation_fingerprint;

/// Una llamada individual al ejecutor de construcción.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicOperation {
    pub method: String,
    pub params: Value,
    #[serde(default)]
    pub description: String,
    /// Clave estable del elemento dentro del bucket de la fase. Las fases
    /// posteriores lo buscan por esta clave y no por su posición.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

impl AtomicOperation {
    pub fn new(method: &str, params: Value) -> Self {
        Self { method: method.to_string(),
               params,
               description: String::new(),
               slot: None }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Huella de método y parámetros; dos operaciones con la misma huella
    /// crean el mismo elemento.
    pub fn fingerprint(&self) -> String {
        operation_fingerprint(&self.method, &self.params)
    }
}

/// Fase de workflow que originó una operación. Viaja con los ítems de revisión
/// para poder devolver los ids aprobados al registro correcto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOrigin {
    pub workflow_id: Uuid,
    pub phase_id: PhaseId,
}

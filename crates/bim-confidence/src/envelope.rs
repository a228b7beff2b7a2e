use bim_core::{AtomicOperation, OperationOrigin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Estado de una operación dentro del pipeline. `Pending` es el único no
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeStatus {
    Pending,
    Executed,
    /// Ejecutada y el resultado informa el id del elemento creado.
    Verified,
    Failed,
    Queued,
}

impl EnvelopeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnvelopeStatus::Pending)
    }
}

/// Una operación con su evaluación de confianza y su desenlace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceEnvelope {
    pub operation_id: Uuid,
    pub method: String,
    pub params: Value,
    #[serde(default)]
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
    /// Último pase en que se evaluó (0 = sin evaluar).
    pub pass: u32,
    pub status: EnvelopeStatus,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub origin: Option<OperationOrigin>,
    #[serde(default)]
    pub review_id: Option<String>,
    /// Clave estable del elemento en su fase, si la operación la declara.
    #[serde(default)]
    pub slot: Option<String>,
    /// Huella de (método, parámetros); identifica reenvíos de la misma
    /// operación.
    #[serde(default)]
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfidenceEnvelope {
    pub fn pending(op: AtomicOperation, origin: Option<OperationOrigin>) -> Self {
        let now = Utc::now();
        let fingerprint = op.fingerprint();
        Self { operation_id: Uuid::new_v4(),
               method: op.method,
               params: op.params,
               description: op.description,
               confidence: 0.0,
               factors: BTreeMap::new(),
               pass: 0,
               status: EnvelopeStatus::Pending,
               result: None,
               error: None,
               origin,
               review_id: None,
               slot: op.slot,
               fingerprint,
               created_at: now,
               updated_at: now }
    }

    /// La operación atómica que representa (con los parámetros vigentes).
    pub fn operation(&self) -> AtomicOperation {
        let mut op = AtomicOperation::new(&self.method, self.params.clone());
        op.description = self.description.clone();
        op.slot = self.slot.clone();
        op
    }

    pub(crate) fn set_status(&mut self, status: EnvelopeStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Ids creados según el payload de resultado.
    pub fn created_ids(&self) -> Vec<String> {
        self.result.as_ref().map(bim_core::phase::created_ids).unwrap_or_default()
    }
}

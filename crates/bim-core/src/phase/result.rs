use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PhaseDefinition, PhaseId, PhaseStatus};
use crate::errors::CoreEngineError;

/// Camino por el que se ejecutaron las operaciones de una fase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Direct,
    Gated,
    /// Gating habilitado pero el pipeline falló; se ejecutó en directo.
    Fallback,
}

/// Origen del fallo de una fase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseErrorKind {
    /// Faltan inputs o el programa no permite planificar la fase.
    Validation,
    /// El ejecutor de construcción falló o agotó el timeout.
    Executor,
}

impl From<&CoreEngineError> for PhaseErrorKind {
    fn from(e: &CoreEngineError) -> Self {
        match e {
            CoreEngineError::Validation(_) => PhaseErrorKind::Validation,
            _ => PhaseErrorKind::Executor,
        }
    }
}

/// Resultado (y estado vigente) de una fase dentro de un workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub phase_id: PhaseId,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_ids: Vec<String>,
    pub confidence: Option<f64>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<PhaseErrorKind>,
    pub warnings: Vec<String>,
    pub attempts: u32,
    /// Ids de ítems de revisión pendientes originados por la fase.
    pub pending_reviews: Vec<String>,
    pub execution_mode: Option<ExecutionMode>,
}

impl PhaseResult {
    pub fn not_started(def: &PhaseDefinition) -> Self {
        Self { phase_id: def.id,
               phase_name: def.name.clone(),
               status: PhaseStatus::NotStarted,
               started_at: None,
               finished_at: None,
               created_ids: Vec::new(),
               confidence: None,
               error: None,
               error_kind: None,
               warnings: Vec::new(),
               attempts: 0,
               pending_reviews: Vec::new(),
               execution_mode: None }
    }

    /// Duración en milisegundos (si la fase terminó).
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(s), Some(f)) => Some((f - s).num_milliseconds()),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PhaseStatus::Completed
    }
}

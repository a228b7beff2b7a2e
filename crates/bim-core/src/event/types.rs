//! Tipos de evento del workflow y estructura `WorkflowEvent`.
//!
//! Rol en el flujo:
//! - Cada transición que el orquestador aplica sobre un `WorkflowState` se
//!   registra en un `EventStore` append-only.
//! - Los eventos son la traza auditable del workflow (qué fase corrió, cuándo,
//!   con qué resultado y por qué camino de ejecución).
//! - El estado vigente vive en el repositorio; los eventos no se reescriben
//!   nunca, ni siquiera al eliminar el workflow.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phase::{ExecutionMode, PhaseId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkflowEventKind {
    /// Primer evento de un workflow. Fija el hash del programa y el tamaño
    /// del catálogo con el que se creó.
    WorkflowCreated {
        program_hash: Option<String>,
        phase_count: usize,
        engine_version: String,
    },
    /// Una fase comenzó su ejecución. No implica éxito.
    PhaseStarted { phase_id: PhaseId, phase_name: String },
    /// Una fase terminó correctamente. `created` cuenta sólo los ids nuevos
    /// incorporados al registro.
    PhaseCompleted {
        phase_id: PhaseId,
        phase_name: String,
        created: usize,
        mode: ExecutionMode,
    },
    /// Una fase falló (validación, ejecutor o timeout).
    PhaseFailed {
        phase_id: PhaseId,
        phase_name: String,
        error: String,
    },
    /// Una fase se omitió explícitamente.
    PhaseSkipped {
        phase_id: PhaseId,
        phase_name: String,
        reason: String,
    },
    /// Parte de las operaciones de la fase quedaron en la cola de revisión.
    PhaseAwaitingReview {
        phase_id: PhaseId,
        phase_name: String,
        review_ids: Vec<String>,
    },
    /// Un revisor resolvió un ítem originado por esta fase.
    ReviewResolved {
        phase_id: PhaseId,
        review_id: String,
        approved: bool,
        created: usize,
    },
    /// Ítems de revisión de la fase retirados de la cola al re-ejecutarla,
    /// omitirla o fallar una aprobación.
    ReviewsWithdrawn { phase_id: PhaseId, review_ids: Vec<String> },
    /// Un ítem de revisión caducó o fue expulsado de la cola sin decisión.
    ReviewLapsed { phase_id: PhaseId, review_id: String },
    /// El pipeline de confianza falló y la fase se ejecutó en modo directo.
    ConfidenceFallback { phase_id: PhaseId, reason: String },
    /// Todas las fases relevantes están completadas u omitidas.
    WorkflowCompleted { total_elements: usize },
    /// Una fase falló con `stop_on_error` activo.
    WorkflowFailed { phase_id: PhaseId, error: String },
    /// El workflow se eliminó del repositorio.
    WorkflowDeleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub seq: u64, // asignado por el EventStore (orden append)
    pub workflow_id: Uuid,
    pub kind: WorkflowEventKind,
    pub ts: DateTime<Utc>,
}

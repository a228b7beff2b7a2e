use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{PhaseFailure, Progress, WorkflowConfig, WorkflowStatus};
use crate::phase::PhaseResult;

/// Resultado de ejecutar (u omitir) una fase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseExecution {
    pub workflow_id: Uuid,
    pub phase: PhaseResult,
    /// Ids nuevos incorporados al registro por esta ejecución.
    pub elements_created: usize,
    pub workflow_complete: bool,
    pub workflow_status: WorkflowStatus,
    pub next_phase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteAllSummary {
    pub workflow_id: Uuid,
    pub phases_executed: usize,
    pub phases_succeeded: usize,
    pub phases_failed: usize,
    pub phases_awaiting_review: usize,
    /// Elementos creados en esta corrida.
    pub total_elements_created: usize,
    pub duration_ms: u64,
    pub results: Vec<PhaseResult>,
    pub workflow_complete: bool,
    pub workflow_status: WorkflowStatus,
    pub summary: String,
}

/// Vista serializable completa de un workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub program_hash: Option<String>,
    pub config: WorkflowConfig,
    pub progress: Progress,
    pub phases: Vec<PhaseResult>,
    pub registry: IndexMap<String, usize>,
    pub total_elements_created: usize,
    pub average_confidence: Option<f64>,
    pub next_phase: Option<String>,
    pub failures: Vec<PhaseFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Entrada del listado de workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub percent: f64,
    pub total_elements_created: usize,
    pub created_at: DateTime<Utc>,
}

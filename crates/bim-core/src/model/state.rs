//! Estado mutable de un workflow y sus transiciones.
//!
//! El orquestador es el único dueño de un `WorkflowState`; toda mutación pasa
//! por los métodos de transición de este módulo, que validan el estado de
//! partida de la fase y mantienen el registro y el total de elementos
//! consistentes.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Progress, Registry, WorkflowConfig};
use crate::errors::CoreEngineError;
use crate::phase::{ExecutionMode, PhaseCatalog, PhaseErrorKind, PhaseId, PhaseResult, PhaseStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Fallo registrado de una fase (se acumulan aunque el workflow continúe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseFailure {
    pub phase_id: PhaseId,
    pub phase_name: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: Uuid,
    /// Snapshot del programa en JSON neutral.
    pub program: Value,
    pub program_hash: Option<String>,
    pub config: WorkflowConfig,
    phases: IndexMap<PhaseId, PhaseResult>,
    registry: Registry,
    status: WorkflowStatus,
    total_elements_created: usize,
    failures: Vec<PhaseFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(id: Uuid,
               program: Value,
               program_hash: Option<String>,
               config: WorkflowConfig,
               catalog: &PhaseCatalog)
               -> Self {
        let now = Utc::now();
        let phases = catalog.phases()
                            .iter()
                            .map(|def| (def.id, PhaseResult::not_started(def)))
                            .collect();
        Self { id,
               program,
               program_hash,
               config,
               phases,
               registry: Registry::new(),
               status: WorkflowStatus::NotStarted,
               total_elements_created: 0,
               failures: Vec::new(),
               created_at: now,
               updated_at: now }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn total_elements_created(&self) -> usize {
        self.total_elements_created
    }

    pub fn failures(&self) -> &[PhaseFailure] {
        &self.failures
    }

    /// Resultados por fase en orden de catálogo.
    pub fn phases(&self) -> impl Iterator<Item = &PhaseResult> {
        self.phases.values()
    }

    pub fn phase(&self, id: PhaseId) -> Option<&PhaseResult> {
        self.phases.get(&id)
    }

    pub fn status_of(&self, id: PhaseId) -> PhaseStatus {
        self.phases.get(&id).map(|p| p.status).unwrap_or(PhaseStatus::NotStarted)
    }

    fn slot_mut(&mut self, id: PhaseId) -> Result<&mut PhaseResult, CoreEngineError> {
        self.phases.get_mut(&id).ok_or_else(|| CoreEngineError::PhaseNotFound(id.to_string()))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn invalid(slot: &PhaseResult, to: PhaseStatus) -> CoreEngineError {
        CoreEngineError::InvalidTransition { phase: slot.phase_name.clone(),
                                             from: slot.status,
                                             to }
    }

    /// `* -> InProgress`. Reinicia error y avisos del intento anterior.
    /// Devuelve los ids de revisión que seguían pendientes: dejan de
    /// aplicarse a la fase.
    pub fn start_phase(&mut self, id: PhaseId) -> Result<Vec<String>, CoreEngineError> {
        let slot = self.slot_mut(id)?;
        if !slot.status.can_start() {
            return Err(Self::invalid(slot, PhaseStatus::InProgress));
        }
        slot.status = PhaseStatus::InProgress;
        slot.started_at = Some(Utc::now());
        slot.finished_at = None;
        slot.error = None;
        slot.error_kind = None;
        slot.warnings.clear();
        let stale = std::mem::take(&mut slot.pending_reviews);
        slot.attempts += 1;
        if self.status == WorkflowStatus::NotStarted {
            self.status = WorkflowStatus::InProgress;
        }
        self.touch();
        Ok(stale)
    }

    /// `InProgress -> Completed`. Incorpora `ids` al bucket y devuelve cuántos
    /// eran nuevos.
    pub fn complete_phase(&mut self,
                          id: PhaseId,
                          bucket: &str,
                          ids: Vec<String>,
                          mode: ExecutionMode,
                          confidence: Option<f64>,
                          warnings: Vec<String>)
                          -> Result<usize, CoreEngineError> {
        self.finish_phase(id, PhaseStatus::Completed, bucket, ids, mode, confidence, warnings)
    }

    /// `InProgress -> RequiresReview`. Los ids de la parte ejecutada se
    /// incorporan al registro; `review_ids` quedan como pendientes.
    #[allow(clippy::too_many_arguments)]
    pub fn await_review(&mut self,
                        id: PhaseId,
                        bucket: &str,
                        ids: Vec<String>,
                        review_ids: Vec<String>,
                        mode: ExecutionMode,
                        confidence: Option<f64>,
                        warnings: Vec<String>)
                        -> Result<usize, CoreEngineError> {
        let added = self.finish_phase(id, PhaseStatus::RequiresReview, bucket, ids, mode, confidence, warnings)?;
        self.slot_mut(id)?.pending_reviews = review_ids;
        Ok(added)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_phase(&mut self,
                    id: PhaseId,
                    to: PhaseStatus,
                    bucket: &str,
                    ids: Vec<String>,
                    mode: ExecutionMode,
                    confidence: Option<f64>,
                    warnings: Vec<String>)
                    -> Result<usize, CoreEngineError> {
        let slot = self.slot_mut(id)?;
        if slot.status != PhaseStatus::InProgress {
            return Err(Self::invalid(slot, to));
        }
        let added = self.registry.merge(bucket, ids.iter().cloned());
        self.total_elements_created += added;
        let slot = self.slot_mut(id)?;
        slot.status = to;
        slot.finished_at = Some(Utc::now());
        slot.created_ids = dedup(ids);
        slot.confidence = confidence;
        slot.warnings = warnings;
        slot.execution_mode = Some(mode);
        self.touch();
        Ok(added)
    }

    /// `InProgress -> Failed` por un error del ejecutor.
    pub fn fail_phase(&mut self, id: PhaseId, error: &str, stop_on_error: bool) -> Result<(), CoreEngineError> {
        self.fail_phase_as(id, PhaseErrorKind::Executor, error, stop_on_error)
    }

    /// `InProgress -> Failed`. Con `stop_on_error` el workflow pasa a `Failed`.
    pub fn fail_phase_as(&mut self,
                         id: PhaseId,
                         kind: PhaseErrorKind,
                         error: &str,
                         stop_on_error: bool)
                         -> Result<(), CoreEngineError> {
        let slot = self.slot_mut(id)?;
        if slot.status != PhaseStatus::InProgress {
            return Err(Self::invalid(slot, PhaseStatus::Failed));
        }
        self.record_failure(id, kind, error, stop_on_error)
    }

    fn record_failure(&mut self,
                      id: PhaseId,
                      kind: PhaseErrorKind,
                      error: &str,
                      stop_on_error: bool)
                      -> Result<(), CoreEngineError> {
        let slot = self.slot_mut(id)?;
        slot.status = PhaseStatus::Failed;
        slot.finished_at = Some(Utc::now());
        slot.error = Some(error.to_string());
        slot.error_kind = Some(kind);
        let failure = PhaseFailure { phase_id: id,
                                     phase_name: slot.phase_name.clone(),
                                     error: error.to_string(),
                                     at: Utc::now() };
        self.failures.push(failure);
        if stop_on_error {
            self.status = WorkflowStatus::Failed;
        }
        self.touch();
        Ok(())
    }

    /// Omite la fase. No se puede omitir una fase completada o en curso.
    /// Devuelve los ids de revisión que quedaban pendientes.
    pub fn skip_phase(&mut self, id: PhaseId, reason: &str) -> Result<Vec<String>, CoreEngineError> {
        let slot = self.slot_mut(id)?;
        if !slot.status.can_skip() {
            return Err(Self::invalid(slot, PhaseStatus::Skipped));
        }
        slot.status = PhaseStatus::Skipped;
        slot.finished_at = Some(Utc::now());
        let stale = std::mem::take(&mut slot.pending_reviews);
        slot.warnings.push(format!("skipped: {reason}"));
        self.touch();
        Ok(stale)
    }

    /// Asocia las claves estables de la fase a sus ids en el registro.
    pub fn bind_slots(&mut self, bucket: &str, slots: &[(String, String)]) {
        for (key, element) in slots {
            self.registry.bind_slot(bucket, key, element);
        }
    }

    /// Quita `review_id` de las revisiones pendientes de la fase. Un id que
    /// la fase no espera (de un intento anterior, por ejemplo) es un error.
    fn take_pending_review(&mut self, id: PhaseId, review_id: &str) -> Result<(), CoreEngineError> {
        let slot = self.slot_mut(id)?;
        if !slot.pending_reviews.iter().any(|r| r == review_id) {
            return Err(CoreEngineError::Validation(format!("review {review_id} is not pending for phase '{}'",
                                                           slot.phase_name)));
        }
        slot.pending_reviews.retain(|r| r != review_id);
        Ok(())
    }

    /// Aplica un ítem de revisión aprobado (o rechazado, con `ids` vacío).
    ///
    /// Los `ids` se incorporan al registro y, si la operación declaraba clave
    /// estable, el primero queda asociado a ella. Resuelto el último ítem
    /// pendiente la fase pasa a `Completed`. Devuelve (ids nuevos, fase
    /// completada).
    pub fn resolve_review(&mut self,
                          id: PhaseId,
                          bucket: &str,
                          review_id: &str,
                          ids: Vec<String>,
                          key: Option<&str>)
                          -> Result<(usize, bool), CoreEngineError> {
        self.take_pending_review(id, review_id)?;
        let added = self.registry.merge(bucket, ids.iter().cloned());
        if let (Some(key), Some(first)) = (key, ids.first()) {
            self.registry.bind_slot(bucket, key, first);
        }
        self.total_elements_created += added;
        let slot = self.slot_mut(id)?;
        for created in ids {
            if !slot.created_ids.contains(&created) {
                slot.created_ids.push(created);
            }
        }
        let completed = slot.status == PhaseStatus::RequiresReview && slot.pending_reviews.is_empty();
        if completed {
            slot.status = PhaseStatus::Completed;
            slot.finished_at = Some(Utc::now());
        }
        self.touch();
        Ok((added, completed))
    }

    /// `RequiresReview -> Failed`: la ejecución de un ítem aprobado falló.
    /// Devuelve los demás ids pendientes, que dejan de aplicarse.
    pub fn fail_review(&mut self,
                       id: PhaseId,
                       review_id: &str,
                       error: &str,
                       stop_on_error: bool)
                       -> Result<Vec<String>, CoreEngineError> {
        self.take_pending_review(id, review_id)?;
        let remaining = std::mem::take(&mut self.slot_mut(id)?.pending_reviews);
        self.record_failure(id, PhaseErrorKind::Executor, error, stop_on_error)?;
        Ok(remaining)
    }

    /// Olvida un ítem pendiente que salió de la cola sin decisión. La fase
    /// sigue en `RequiresReview` y puede re-ejecutarse.
    pub fn abandon_review(&mut self, id: PhaseId, review_id: &str) -> Result<(), CoreEngineError> {
        self.take_pending_review(id, review_id)?;
        self.slot_mut(id)?
            .warnings
            .push(format!("review {review_id} lapsed without a decision"));
        self.touch();
        Ok(())
    }

    /// Recalcula el estado global.
    ///
    /// `Failed` (fijado por `fail_phase` con `stop_on_error`) se mantiene
    /// mientras quede alguna fase fallida. En otro caso: `NotStarted` si
    /// ninguna fase salió de `NotStarted`; `Completed` si no queda fase
    /// elegible y ninguna falló; `InProgress` en el resto.
    pub fn refresh_status(&mut self, catalog: &PhaseCatalog) -> WorkflowStatus {
        let any_failed = self.phases.values().any(|p| p.status == PhaseStatus::Failed);
        if self.status == WorkflowStatus::Failed && any_failed {
            return self.status;
        }
        let started = self.phases.values().any(|p| p.status != PhaseStatus::NotStarted);
        self.status = if !started {
            WorkflowStatus::NotStarted
        } else if !any_failed && catalog.next_eligible(self).is_none() {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::InProgress
        };
        self.status
    }

    /// `true` si no queda ninguna fase elegible.
    pub fn is_complete(&self, catalog: &PhaseCatalog) -> bool {
        catalog.next_eligible(self).is_none()
    }

    pub fn progress(&self, catalog: &PhaseCatalog) -> Progress {
        let relevant: Vec<&PhaseResult> = catalog.phases()
                                                 .iter()
                                                 .filter(|def| catalog.is_relevant(def, self))
                                                 .filter_map(|def| self.phases.get(&def.id))
                                                 .collect();
        let count = |s: PhaseStatus| relevant.iter().filter(|p| p.status == s).count();
        let completed = count(PhaseStatus::Completed);
        let skipped = count(PhaseStatus::Skipped);
        let percent = if relevant.is_empty() {
            100.0
        } else {
            (((completed + skipped) as f64 / relevant.len() as f64) * 10_000.0).round() / 100.0
        };
        Progress { total_phases: catalog.len(),
                   relevant_phases: relevant.len(),
                   completed,
                   skipped,
                   failed: count(PhaseStatus::Failed),
                   requires_review: count(PhaseStatus::RequiresReview),
                   in_progress: count(PhaseStatus::InProgress),
                   not_started: count(PhaseStatus::NotStarted),
                   percent }
    }

    /// Media de confianza sobre las fases completadas que la informan.
    pub fn average_confidence(&self) -> Option<f64> {
        let scores: Vec<f64> = self.phases
                                   .values()
                                   .filter(|p| p.status == PhaseStatus::Completed)
                                   .filter_map(|p| p.confidence)
                                   .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

//! Implementación del `WorkflowOrchestrator`.

use log::{debug, info, warn};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::constants::{DEFAULT_OPERATION_TIMEOUT_MS, ENGINE_VERSION};
use crate::engine::builder::OrchestratorBuilder;
use crate::engine::gate::{GateOutcome, GatedBatch, OperationGate, ReviewVerdict};
use crate::engine::summary::{ExecuteAllSummary, PhaseExecution, WorkflowSnapshot, WorkflowSummary};
use crate::errors::CoreEngineError;
use crate::event::{EventStore, InMemoryEventStore, WorkflowEvent, WorkflowEventKind};
use crate::model::{Progress, WorkflowConfig, WorkflowState, WorkflowStatus};
use crate::phase::{execute_operations_direct, BuildExecutor, DependencyGraph, ExecutionMode, PhaseCatalog,
                   PhaseContext, PhaseDefinition, PhaseErrorKind, PhaseExecutor, PhaseId, PhaseOutput, PhaseResult,
                   PhaseStatus};
use crate::repo::{InMemoryWorkflowRepository, SharedWorkflow, WorkflowRepository};

/// Lo que deja correr el ejecutor de una fase antes de aplicarlo al estado.
enum PhaseRun {
    Done { output: PhaseOutput, mode: ExecutionMode },
    AwaitingReview { output: PhaseOutput, review_ids: Vec<String> },
}

/// Scheduler de workflows por fases.
///
/// Elige la siguiente fase con dependencias satisfechas, la despacha a su
/// ejecutor (directo o a través del gate de confianza), aplica el resultado al
/// estado y al registro, y agrega los resultados de `execute_all`. Un error del
/// ejecutor nunca escapa: se convierte en un `PhaseResult` fallido.
pub struct WorkflowOrchestrator<R = InMemoryWorkflowRepository, E = InMemoryEventStore>
    where R: WorkflowRepository,
          E: EventStore
{
    pub(crate) catalog: Arc<PhaseCatalog>,
    pub(crate) executors: HashMap<PhaseId, Arc<dyn PhaseExecutor>>,
    pub(crate) build: Arc<dyn BuildExecutor>,
    pub(crate) gate: Option<Arc<dyn OperationGate>>,
    pub(crate) repository: R,
    pub(crate) events: E,
    pub(crate) operation_timeout: Duration,
}

impl WorkflowOrchestrator {
    /// Builder con repositorio y event store en memoria.
    pub fn builder(catalog: PhaseCatalog, build: Arc<dyn BuildExecutor>) -> OrchestratorBuilder {
        OrchestratorBuilder { catalog,
                              executors: Vec::new(),
                              build,
                              gate: None,
                              repository: InMemoryWorkflowRepository::new(),
                              events: InMemoryEventStore::new(),
                              operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS) }
    }
}

impl<R, E> WorkflowOrchestrator<R, E>
    where R: WorkflowRepository,
          E: EventStore
{
    pub fn catalog(&self) -> &PhaseCatalog {
        &self.catalog
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn phase_definitions(&self) -> &[PhaseDefinition] {
        self.catalog.phases()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        self.catalog.dependency_graph()
    }

    /// Resuelve una fase por id numérico o nombre.
    pub fn resolve_phase(&self, key: &str) -> Result<PhaseId, CoreEngineError> {
        self.catalog
            .resolve(key)
            .map(|d| d.id)
            .ok_or_else(|| CoreEngineError::PhaseNotFound(key.to_string()))
    }

    fn handle(&self, workflow_id: Uuid) -> Result<SharedWorkflow, CoreEngineError> {
        self.repository.get(workflow_id).ok_or(CoreEngineError::WorkflowNotFound(workflow_id))
    }

    /// Crea un workflow con todas las fases en `NotStarted`.
    pub fn create_workflow(&self,
                           program: Value,
                           program_hash: Option<String>,
                           config: WorkflowConfig)
                           -> WorkflowSnapshot {
        let id = Uuid::new_v4();
        let state = WorkflowState::new(id, program, program_hash.clone(), config, &self.catalog);
        let snapshot = self.snapshot_of(&state);
        self.repository.insert(state);
        self.events.append_kind(id,
                                WorkflowEventKind::WorkflowCreated { program_hash,
                                                                     phase_count: self.catalog.len(),
                                                                     engine_version: ENGINE_VERSION.to_string() });
        info!("workflow created workflow_id={id} phases={}", self.catalog.len());
        snapshot
    }

    fn snapshot_of(&self, state: &WorkflowState) -> WorkflowSnapshot {
        WorkflowSnapshot { workflow_id: state.id,
                           status: state.status(),
                           program_hash: state.program_hash.clone(),
                           config: state.config,
                           progress: state.progress(&self.catalog),
                           phases: state.phases().cloned().collect(),
                           registry: state.registry().counts(),
                           total_elements_created: state.total_elements_created(),
                           average_confidence: state.average_confidence(),
                           next_phase: self.catalog.next_eligible(state).map(|d| d.name.clone()),
                           failures: state.failures().to_vec(),
                           created_at: state.created_at,
                           updated_at: state.updated_at }
    }

    pub async fn snapshot(&self, workflow_id: Uuid) -> Result<WorkflowSnapshot, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let state = shared.lock().await;
        Ok(self.snapshot_of(&state))
    }

    /// Copia del estado completo (para serializar o inspeccionar).
    pub async fn state(&self, workflow_id: Uuid) -> Result<WorkflowState, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let state = shared.lock().await;
        Ok(state.clone())
    }

    pub async fn progress(&self, workflow_id: Uuid) -> Result<Progress, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let state = shared.lock().await;
        Ok(state.progress(&self.catalog))
    }

    pub async fn next_eligible_phase(&self, workflow_id: Uuid) -> Result<Option<PhaseDefinition>, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let state = shared.lock().await;
        Ok(self.catalog.next_eligible(&state).cloned())
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowSummary> {
        let mut out = Vec::new();
        for id in self.repository.ids() {
            let Some(shared) = self.repository.get(id) else {
                continue;
            };
            let state = shared.lock().await;
            out.push(WorkflowSummary { workflow_id: id,
                                       status: state.status(),
                                       percent: state.progress(&self.catalog).percent,
                                       total_elements_created: state.total_elements_created(),
                                       created_at: state.created_at });
        }
        out
    }

    /// Elimina un workflow. Sus eventos se conservan.
    pub async fn delete_workflow(&self, workflow_id: Uuid) -> Result<(), CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        // espera a que termine cualquier fase en curso
        let _guard = shared.lock().await;
        self.repository.remove(workflow_id);
        self.events.append_kind(workflow_id, WorkflowEventKind::WorkflowDeleted);
        info!("workflow deleted workflow_id={workflow_id}");
        Ok(())
    }

    pub fn events_for(&self, workflow_id: Uuid) -> Vec<WorkflowEvent> {
        self.events.list(workflow_id)
    }

    /// Ejecuta la siguiente fase elegible. `Ok(None)` si no queda ninguna.
    pub async fn execute_next_phase(&self, workflow_id: Uuid) -> Result<Option<PhaseExecution>, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        let Some(phase_id) = self.catalog.next_eligible(&state).map(|d| d.id) else {
            return Ok(None);
        };
        let stop_on_error = state.config.stop_on_error;
        self.run_phase_locked(&mut state, phase_id, stop_on_error).await.map(Some)
    }

    /// Ejecuta una fase concreta.
    ///
    /// # Errores
    /// `DependenciesNotSatisfied` (sin mutar el estado) si alguna dependencia
    /// no está completada u omitida; `WorkflowNotFound` / `PhaseNotFound` si
    /// las referencias no existen. Los fallos de la fase no son errores: se
    /// devuelven como `PhaseResult` con estado `Failed`.
    pub async fn execute_phase(&self, workflow_id: Uuid, phase_id: PhaseId) -> Result<PhaseExecution, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        let stop_on_error = state.config.stop_on_error;
        self.run_phase_locked(&mut state, phase_id, stop_on_error).await
    }

    /// Ejecuta fases elegibles hasta que no quede ninguna (o la primera falle
    /// con `stop_on_error`). Cada fase se intenta a lo sumo una vez por
    /// corrida. No hay rollback de fases completadas.
    pub async fn execute_all(&self,
                             workflow_id: Uuid,
                             stop_on_error: Option<bool>)
                             -> Result<ExecuteAllSummary, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        let stop_on_error = stop_on_error.unwrap_or(state.config.stop_on_error);
        let started = Instant::now();
        let mut attempted: HashSet<PhaseId> = HashSet::new();
        let mut results: Vec<PhaseResult> = Vec::new();
        let mut created = 0usize;

        while let Some(phase_id) = self.catalog.next_eligible_excluding(&state, &attempted).map(|d| d.id) {
            attempted.insert(phase_id);
            let exec = self.run_phase_locked(&mut state, phase_id, stop_on_error).await?;
            created += exec.elements_created;
            let failed = exec.phase.status == PhaseStatus::Failed;
            results.push(exec.phase);
            if failed && stop_on_error {
                warn!("execute_all stopped workflow_id={workflow_id} phase={phase_id}");
                break;
            }
        }

        let count = |s: PhaseStatus| results.iter().filter(|r| r.status == s).count();
        let succeeded = count(PhaseStatus::Completed);
        let failed = count(PhaseStatus::Failed);
        let awaiting = count(PhaseStatus::RequiresReview);
        let workflow_complete = state.is_complete(&self.catalog);
        let summary = format!("{} phases executed: {succeeded} succeeded, {failed} failed, {awaiting} awaiting review; \
                               {created} elements created",
                              results.len());
        info!("execute_all finished workflow_id={workflow_id} {summary}");
        Ok(ExecuteAllSummary { workflow_id,
                               phases_executed: results.len(),
                               phases_succeeded: succeeded,
                               phases_failed: failed,
                               phases_awaiting_review: awaiting,
                               total_elements_created: created,
                               duration_ms: started.elapsed().as_millis() as u64,
                               results,
                               workflow_complete,
                               workflow_status: state.status(),
                               summary })
    }

    /// Omite una fase (p. ej. una opcional que no se quiere construir).
    pub async fn skip_phase(&self,
                            workflow_id: Uuid,
                            phase_id: PhaseId,
                            reason: &str)
                            -> Result<PhaseExecution, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        let def = self.definition(phase_id)?;
        let stale = state.skip_phase(phase_id, reason)?;
        self.withdraw_reviews(workflow_id, phase_id, stale);
        self.events.append_kind(workflow_id,
                                WorkflowEventKind::PhaseSkipped { phase_id,
                                                                  phase_name: def.name.clone(),
                                                                  reason: reason.to_string() });
        self.refresh(&mut state);
        self.execution_of(&state, phase_id, 0)
    }

    /// Aplica a la fase `phase_id` el desenlace de uno de sus ítems de
    /// revisión.
    ///
    /// Los ids de una aprobación ejecutada entran al registro y, resuelta la
    /// última revisión pendiente, la fase pasa a `Completed`. Una aprobación
    /// cuya ejecución falló deja la fase en `Failed` y retira de la cola sus
    /// demás ítems.
    ///
    /// # Errores
    /// `Validation` si `review_id` no está pendiente en la fase.
    pub async fn apply_review_resolution(&self,
                                         workflow_id: Uuid,
                                         phase_id: PhaseId,
                                         review_id: &str,
                                         verdict: ReviewVerdict)
                                         -> Result<PhaseExecution, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        let def = self.definition(phase_id)?;
        let approved = verdict.is_approval();
        let (added, completed) = match verdict {
            ReviewVerdict::Applied { created_ids, slot } => {
                state.resolve_review(phase_id, &def.registry_bucket, review_id, created_ids, slot.as_deref())?
            }
            ReviewVerdict::Rejected => state.resolve_review(phase_id, &def.registry_bucket, review_id, vec![], None)?,
            ReviewVerdict::Failed { error } => {
                let stop_on_error = state.config.stop_on_error;
                let message = format!("approved review {review_id} failed: {error}");
                let rest = state.fail_review(phase_id, review_id, &message, stop_on_error)?;
                self.withdraw_reviews(workflow_id, phase_id, rest);
                self.events.append_kind(workflow_id,
                                        WorkflowEventKind::PhaseFailed { phase_id,
                                                                         phase_name: def.name.clone(),
                                                                         error: message.clone() });
                warn!("phase failed workflow_id={workflow_id} phase={} error={message}", def.name);
                (0, false)
            }
        };
        self.events.append_kind(workflow_id,
                                WorkflowEventKind::ReviewResolved { phase_id,
                                                                    review_id: review_id.to_string(),
                                                                    approved,
                                                                    created: added });
        if completed {
            self.events.append_kind(workflow_id,
                                    WorkflowEventKind::PhaseCompleted { phase_id,
                                                                        phase_name: def.name.clone(),
                                                                        created: added,
                                                                        mode: ExecutionMode::Gated });
        }
        debug!("review resolved workflow_id={workflow_id} phase={phase_id} review_id={review_id} added={added}");
        self.refresh(&mut state);
        self.execution_of(&state, phase_id, added)
    }

    /// Un ítem de revisión de la fase salió de la cola sin decisión
    /// (caducado o expulsado). La fase sigue a la espera y puede
    /// re-ejecutarse.
    pub async fn abandon_review(&self,
                                workflow_id: Uuid,
                                phase_id: PhaseId,
                                review_id: &str)
                                -> Result<PhaseExecution, CoreEngineError> {
        let shared = self.handle(workflow_id)?;
        let mut state = shared.lock().await;
        state.abandon_review(phase_id, review_id)?;
        self.events.append_kind(workflow_id,
                                WorkflowEventKind::ReviewLapsed { phase_id,
                                                                  review_id: review_id.to_string() });
        warn!("review lapsed workflow_id={workflow_id} phase={phase_id} review_id={review_id}");
        self.execution_of(&state, phase_id, 0)
    }

    /// Retira de la cola los ítems que la fase ya no espera.
    fn withdraw_reviews(&self, workflow_id: Uuid, phase_id: PhaseId, review_ids: Vec<String>) {
        if review_ids.is_empty() {
            return;
        }
        let removed = self.gate.as_ref().map(|g| g.withdraw(&review_ids)).unwrap_or(0);
        info!("reviews withdrawn workflow_id={workflow_id} phase={phase_id} stale={} removed={removed}",
              review_ids.len());
        self.events.append_kind(workflow_id, WorkflowEventKind::ReviewsWithdrawn { phase_id, review_ids });
    }

    fn definition(&self, phase_id: PhaseId) -> Result<PhaseDefinition, CoreEngineError> {
        self.catalog
            .get(phase_id)
            .cloned()
            .ok_or_else(|| CoreEngineError::PhaseNotFound(phase_id.to_string()))
    }

    fn execution_of(&self,
                    state: &WorkflowState,
                    phase_id: PhaseId,
                    elements_created: usize)
                    -> Result<PhaseExecution, CoreEngineError> {
        let phase = state.phase(phase_id)
                         .cloned()
                         .ok_or_else(|| CoreEngineError::PhaseNotFound(phase_id.to_string()))?;
        Ok(PhaseExecution { workflow_id: state.id,
                            phase,
                            elements_created,
                            workflow_complete: state.is_complete(&self.catalog),
                            workflow_status: state.status(),
                            next_phase: self.catalog.next_eligible(state).map(|d| d.name.clone()) })
    }

    /// Recalcula el estado global y emite el evento de cierre si cambió.
    fn refresh(&self, state: &mut WorkflowState) {
        let before = state.status();
        let after = state.refresh_status(&self.catalog);
        if before == after {
            return;
        }
        match after {
            WorkflowStatus::Completed => {
                self.events.append_kind(state.id,
                                        WorkflowEventKind::WorkflowCompleted { total_elements:
                                                                                   state.total_elements_created() });
                info!("workflow completed workflow_id={} elements={}", state.id, state.total_elements_created());
            }
            WorkflowStatus::Failed => {
                if let Some(last) = state.failures().last() {
                    self.events.append_kind(state.id,
                                            WorkflowEventKind::WorkflowFailed { phase_id: last.phase_id,
                                                                                error: last.error.clone() });
                }
            }
            _ => {}
        }
    }

    async fn run_phase_locked(&self,
                              state: &mut WorkflowState,
                              phase_id: PhaseId,
                              stop_on_error: bool)
                              -> Result<PhaseExecution, CoreEngineError> {
        let definition = self.definition(phase_id)?;
        let missing = self.catalog.unsatisfied_dependencies(&definition, state);
        if !missing.is_empty() {
            return Err(CoreEngineError::DependenciesNotSatisfied { phase: definition.name.clone(),
                                                                   missing:
                                                                       missing.iter().map(|d| d.name.clone()).collect() });
        }
        let executor = self.executors
                           .get(&phase_id)
                           .cloned()
                           .ok_or_else(|| CoreEngineError::Internal(format!("no executor registered for phase {}",
                                                                            definition.name)))?;

        let workflow_id = state.id;
        let stale = state.start_phase(phase_id)?;
        self.withdraw_reviews(workflow_id, phase_id, stale);
        self.events.append_kind(workflow_id,
                                WorkflowEventKind::PhaseStarted { phase_id,
                                                                  phase_name: definition.name.clone() });
        debug!("phase started workflow_id={workflow_id} phase={}", definition.name);

        let ctx = PhaseContext { workflow_id,
                                 definition: definition.clone(),
                                 program: state.program.clone(),
                                 registry: state.registry().clone(),
                                 operation_timeout: self.operation_timeout };
        let bucket = definition.registry_bucket.as_str();

        let added = match self.run_executor(&ctx, executor.as_ref(), &state.config).await {
            Ok(PhaseRun::Done { output, mode }) => {
                let PhaseOutput { created_ids,
                                  warnings,
                                  confidence,
                                  slots } = output;
                let added = state.complete_phase(phase_id, bucket, created_ids, mode, confidence, warnings)?;
                state.bind_slots(bucket, &slots);
                self.events.append_kind(workflow_id,
                                        WorkflowEventKind::PhaseCompleted { phase_id,
                                                                            phase_name: definition.name.clone(),
                                                                            created: added,
                                                                            mode });
                info!("phase completed workflow_id={workflow_id} phase={} created={added} mode={mode:?}",
                      definition.name);
                added
            }
            Ok(PhaseRun::AwaitingReview { output, review_ids }) => {
                let PhaseOutput { created_ids,
                                  warnings,
                                  confidence,
                                  slots } = output;
                let added = state.await_review(phase_id,
                                               bucket,
                                               created_ids,
                                               review_ids.clone(),
                                               ExecutionMode::Gated,
                                               confidence,
                                               warnings)?;
                state.bind_slots(bucket, &slots);
                self.events.append_kind(workflow_id,
                                        WorkflowEventKind::PhaseAwaitingReview { phase_id,
                                                                                 phase_name: definition.name.clone(),
                                                                                 review_ids });
                info!("phase awaiting review workflow_id={workflow_id} phase={} created={added}",
                      definition.name);
                added
            }
            Err(e) => {
                let message = e.to_string();
                state.fail_phase_as(phase_id, PhaseErrorKind::from(&e), &message, stop_on_error)?;
                self.events.append_kind(workflow_id,
                                        WorkflowEventKind::PhaseFailed { phase_id,
                                                                         phase_name: definition.name.clone(),
                                                                         error: message.clone() });
                warn!("phase failed workflow_id={workflow_id} phase={} error={message}", definition.name);
                0
            }
        };

        self.refresh(state);
        self.execution_of(state, phase_id, added)
    }

    /// Corre la fase por el gate (si aplica) o en directo. Todo error del
    /// ejecutor se devuelve como `Err` para marcar la fase fallida.
    async fn run_executor(&self,
                          ctx: &PhaseContext,
                          executor: &dyn PhaseExecutor,
                          config: &WorkflowConfig)
                          -> Result<PhaseRun, CoreEngineError> {
        executor.validate(ctx)?;

        let gate = match &self.gate {
            Some(g) if config.use_confidence_gating && g.is_enabled() => g.clone(),
            _ => return self.run_direct(ctx, executor, ExecutionMode::Direct).await,
        };
        let operations = executor.operations(ctx)?;
        if operations.is_empty() {
            // fases de descubrimiento: siempre por el camino directo
            return self.run_direct(ctx, executor, ExecutionMode::Direct).await;
        }

        let total = operations.len();
        let batch = GatedBatch { description: format!("{} ({total} operations)", ctx.definition.name),
                                 operations,
                                 auto_execute: config.auto_execute_high_confidence,
                                 origin: Some(ctx.origin()),
                                 known_ids: ctx.registry.all_ids() };
        match gate.process(batch).await {
            Ok(outcome) => {
                let GateOutcome { success,
                                  mut created_ids,
                                  failed,
                                  queued,
                                  review_ids,
                                  average_confidence,
                                  mut errors,
                                  mut slots,
                                  interrupted,
                                  remaining,
                                  .. } = outcome;
                if !success {
                    return Err(CoreEngineError::Executor(format!("{failed} of {total} operations failed: {}",
                                                                 errors.join("; "))));
                }
                if let Some(reason) = interrupted {
                    // lo ya ejecutado por el pipeline no se repite
                    warn!("confidence pipeline interrupted, running {} remaining operations directly workflow_id={} \
                           phase={} reason={reason}",
                          remaining.len(),
                          ctx.workflow_id,
                          ctx.definition.name);
                    self.events.append_kind(ctx.workflow_id,
                                            WorkflowEventKind::ConfidenceFallback { phase_id: ctx.definition.id,
                                                                                    reason: reason.clone() });
                    let rest =
                        execute_operations_direct(self.build.as_ref(), &remaining, self.operation_timeout).await?;
                    created_ids.extend(rest.created_ids);
                    slots.extend(rest.slots);
                    errors.push(format!("confidence pipeline fallback after partial execution: {reason}"));
                    let output = PhaseOutput { created_ids,
                                               warnings: errors,
                                               confidence: average_confidence,
                                               slots };
                    return Ok(PhaseRun::Done { output,
                                               mode: ExecutionMode::Fallback });
                }
                let output = PhaseOutput { created_ids,
                                           warnings: errors,
                                           confidence: average_confidence,
                                           slots };
                if queued > 0 {
                    Ok(PhaseRun::AwaitingReview { output, review_ids })
                } else {
                    Ok(PhaseRun::Done { output,
                                        mode: ExecutionMode::Gated })
                }
            }
            Err(e) => {
                warn!("confidence pipeline failed, falling back to direct execution workflow_id={} phase={} error={e}",
                      ctx.workflow_id,
                      ctx.definition.name);
                self.events.append_kind(ctx.workflow_id,
                                        WorkflowEventKind::ConfidenceFallback { phase_id: ctx.definition.id,
                                                                                reason: e.to_string() });
                let mut run = self.run_direct(ctx, executor, ExecutionMode::Fallback).await?;
                if let PhaseRun::Done { output, .. } = &mut run {
                    output.warnings.push(format!("confidence pipeline fallback: {e}"));
                }
                Ok(run)
            }
        }
    }

    async fn run_direct(&self,
                        ctx: &PhaseContext,
                        executor: &dyn PhaseExecutor,
                        mode: ExecutionMode)
                        -> Result<PhaseRun, CoreEngineError> {
        let output = executor.execute(ctx, self.build.as_ref()).await?;
        Ok(PhaseRun::Done { output, mode })
    }
}

use bim_core::{PhaseErrorKind, PhaseExecution, PhaseStatus, WorkflowConfig, WorkflowStatus};
use bim_domain::BuildProgram;
use serde_json::{json, Value};

use super::envelope::{to_body, with_fields};
use super::params::{opt_bool, opt_str, phase_key, workflow_id};
use super::BuildService;
use crate::errors::{ApiError, ErrorKind};

const DEFAULT_SKIP_REASON: &str = "skipped on request";

/// Flags del workflow; los ausentes toman los valores por defecto.
fn workflow_config(params: &Value) -> Result<WorkflowConfig, ApiError> {
    let defaults = WorkflowConfig::default();
    Ok(WorkflowConfig { skip_optional: opt_bool(params, "skipOptionalPhases")?.unwrap_or(defaults.skip_optional),
                        auto_execute_high_confidence: opt_bool(params, "autoExecuteHighConfidence")?
                            .unwrap_or(defaults.auto_execute_high_confidence),
                        stop_on_error: opt_bool(params, "stopOnError")?.unwrap_or(defaults.stop_on_error),
                        use_confidence_gating: opt_bool(params, "useConfidenceGating")?
                            .unwrap_or(defaults.use_confidence_gating) })
}

/// Cuerpo de una ejecución de fase. Una fase `Failed` se informa como
/// envelope fallido con el error de la fase.
fn phase_body(exec: &PhaseExecution) -> Result<Value, ApiError> {
    let body = to_body(exec)?;
    if exec.phase.status != PhaseStatus::Failed {
        return Ok(body);
    }
    let error = exec.phase.error.clone().unwrap_or_else(|| "phase failed".to_string());
    let kind = match exec.phase.error_kind {
        Some(PhaseErrorKind::Validation) => ErrorKind::Validation,
        _ => ErrorKind::Executor,
    };
    Ok(with_fields(body, json!({"success": false, "error": error, "errorKind": kind.as_str()})))
}

impl BuildService {
    /// Valida el programa y crea el workflow. Un programa inválido no deja
    /// ningún estado.
    pub fn create_workflow(&self, params: &Value) -> Result<Value, ApiError> {
        let program = BuildProgram::from_value(params)?;
        let config = workflow_config(params)?;
        let snapshot = self.orchestrator.create_workflow(program.to_value()?, Some(program.program_hash()), config);
        Ok(json!({
            "workflowId": snapshot.workflow_id,
            "status": snapshot.status,
            "nextPhase": snapshot.next_phase,
            "phaseCount": snapshot.phases.len(),
            "programHash": snapshot.program_hash,
            "config": snapshot.config,
        }))
    }

    pub async fn get_workflow(&self, params: &Value) -> Result<Value, ApiError> {
        let snapshot = self.orchestrator.snapshot(workflow_id(params)?).await?;
        to_body(&snapshot)
    }

    pub async fn execute_next_phase(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        match self.orchestrator.execute_next_phase(id).await? {
            Some(exec) => Ok(with_fields(phase_body(&exec)?, json!({"executed": true}))),
            None => {
                let snapshot = self.orchestrator.snapshot(id).await?;
                Ok(json!({
                    "workflowId": id,
                    "executed": false,
                    "message": "no eligible phase remains",
                    "workflowComplete": snapshot.status == WorkflowStatus::Completed,
                    "workflowStatus": snapshot.status,
                }))
            }
        }
    }

    /// Ejecuta la fase indicada por nombre o id.
    pub async fn execute_phase(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        let phase = self.orchestrator.resolve_phase(&phase_key(params)?)?;
        let exec = self.orchestrator.execute_phase(id, phase).await?;
        phase_body(&exec)
    }

    pub async fn execute_all(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        let summary = self.orchestrator.execute_all(id, opt_bool(params, "stopOnError")?).await?;
        let body = to_body(&summary)?;
        Ok(with_fields(body, json!({"success": summary.phases_failed == 0})))
    }

    pub async fn skip_phase(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        let phase = self.orchestrator.resolve_phase(&phase_key(params)?)?;
        let reason = opt_str(params, "reason")?.unwrap_or(DEFAULT_SKIP_REASON);
        let exec = self.orchestrator.skip_phase(id, phase, reason).await?;
        to_body(&exec)
    }

    pub fn phase_definitions(&self) -> Result<Value, ApiError> {
        let phases = self.orchestrator.phase_definitions();
        Ok(json!({"phases": to_body(&phases)?, "count": phases.len()}))
    }

    pub fn dependency_graph(&self) -> Result<Value, ApiError> {
        to_body(&self.orchestrator.dependency_graph())
    }

    pub async fn progress(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        let progress = self.orchestrator.progress(id).await?;
        Ok(with_fields(to_body(&progress)?, json!({"workflowId": id})))
    }

    pub async fn list_workflows(&self) -> Result<Value, ApiError> {
        let workflows = self.orchestrator.list_workflows().await;
        Ok(json!({"workflows": to_body(&workflows)?, "count": workflows.len()}))
    }

    pub async fn delete_workflow(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        self.orchestrator.delete_workflow(id).await?;
        Ok(json!({"workflowId": id, "deleted": true}))
    }

    /// Historial de eventos (sobrevive al borrado del workflow).
    pub fn workflow_events(&self, params: &Value) -> Result<Value, ApiError> {
        let id = workflow_id(params)?;
        let events = self.orchestrator.events_for(id);
        if events.is_empty() {
            return Err(ApiError::NotFound(format!("workflow {id}")));
        }
        Ok(json!({"workflowId": id, "events": to_body(&events)?, "count": events.len()}))
    }
}

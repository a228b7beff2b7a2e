use bim_confidence::ReviewDecision;
use bim_core::AtomicOperation;
use log::{debug, info, warn};
use serde_json::{json, Value};

use super::envelope::{to_body, with_fields};
use super::params::{opt_bool, opt_field, opt_str, req_str, uuid_param};
use super::BuildService;
use crate::errors::ApiError;

fn operation_params(params: &Value) -> Value {
    params.get("params").cloned().unwrap_or_else(|| json!({}))
}

impl BuildService {
    /// Puntúa una operación sin ejecutarla.
    pub fn calculate_confidence(&self, params: &Value) -> Result<Value, ApiError> {
        let method = req_str(params, "method")?;
        let known_ids: Vec<String> = opt_field(params, "knownIds")?.unwrap_or_default();
        let assessment = self.cips.calculate_confidence(method, &operation_params(params), &known_ids)?;
        to_body(&assessment)
    }

    pub async fn process_operation(&self, params: &Value) -> Result<Value, ApiError> {
        let mut operation = AtomicOperation::new(req_str(params, "method")?, operation_params(params));
        if let Some(description) = opt_str(params, "description")? {
            operation.description = description.to_string();
        }
        let auto_execute = opt_bool(params, "autoExecute")?.unwrap_or(true);
        let report = self.cips.process_operation(operation, auto_execute, None).await?;
        to_body(&report)
    }

    /// Lote ad hoc (sin workflow de origen). El `success` del cuerpo es el
    /// del lote.
    pub async fn process_batch(&self, params: &Value) -> Result<Value, ApiError> {
        let operations: Vec<AtomicOperation> =
            opt_field(params, "operations")?.ok_or_else(|| ApiError::missing_param("operations"))?;
        if operations.is_empty() {
            return Err(ApiError::Validation("operations must not be empty".into()));
        }
        if let Some(op) = operations.iter().find(|op| op.method.trim().is_empty()) {
            return Err(ApiError::Validation(format!("operation without method: {}", op.params)));
        }
        let description = opt_str(params, "description")?.unwrap_or("ad hoc batch");
        let auto_execute = opt_bool(params, "autoExecute")?.unwrap_or(true);
        let report = self.cips.process_batch(operations, description, auto_execute, None, Vec::new()).await?;
        to_body(&report)
    }

    /// Resuelve un ítem de revisión. Si la operación venía de una fase, su
    /// desenlace vuelve al workflow: los ids creados entran al registro y,
    /// resuelta la última revisión, la fase se completa; una aprobación que
    /// falla al ejecutarse deja la fase `Failed`.
    pub async fn submit_review(&self, params: &Value) -> Result<Value, ApiError> {
        let review_id = req_str(params, "reviewId")?;
        let decision: ReviewDecision = req_str(params, "decision")?.parse()?;
        let modified_params = params.get("modifiedParams").filter(|v| !v.is_null()).cloned();
        let notes = opt_str(params, "notes")?.map(str::to_string);

        let outcome = self.cips.submit_review(review_id, decision, modified_params, notes).await?;
        let mut body = to_body(&outcome)?;
        if let Some(origin) = outcome.origin {
            match self.orchestrator
                      .apply_review_resolution(origin.workflow_id,
                                               origin.phase_id,
                                               &outcome.review_id,
                                               outcome.verdict())
                      .await
            {
                Ok(exec) => {
                    info!("review applied to workflow workflow_id={} phase={} status={:?}",
                          origin.workflow_id, origin.phase_id, exec.phase.status);
                    body = with_fields(body, json!({"phase": to_body(&exec)?}));
                }
                Err(e) => {
                    warn!("review resolved but workflow not updated workflow_id={} review_id={} error={e}",
                          origin.workflow_id, outcome.review_id);
                    body = with_fields(body, json!({"phase": null, "warning": e.to_string()}));
                }
            }
        }
        Ok(body)
    }

    pub fn pending_reviews(&self) -> Result<Value, ApiError> {
        let reviews = self.cips.pending_reviews();
        Ok(json!({"reviews": to_body(&reviews)?, "count": reviews.len()}))
    }

    pub fn review(&self, params: &Value) -> Result<Value, ApiError> {
        let review_id = req_str(params, "reviewId")?;
        let item = self.cips
                       .review(review_id)
                       .ok_or_else(|| ApiError::NotFound(format!("review item {review_id}")))?;
        to_body(&item)
    }

    pub fn queue_stats(&self) -> Result<Value, ApiError> {
        to_body(&self.cips.queue_stats())
    }

    pub fn feedback_stats(&self) -> Result<Value, ApiError> {
        to_body(&self.cips.feedback_stats())
    }

    pub fn envelope(&self, params: &Value) -> Result<Value, ApiError> {
        let operation_id = uuid_param(params, "operationId")?;
        let envelope = self.cips
                           .envelope(&operation_id)
                           .ok_or_else(|| ApiError::NotFound(format!("operation {operation_id}")))?;
        to_body(&envelope)
    }

    /// Avisa a cada fase de origen de los ítems que salieron de la cola sin
    /// decisión (caducados o expulsados).
    pub(crate) async fn release_lapsed_reviews(&self) {
        for item in self.cips.take_lapsed() {
            let Some(origin) = item.envelope.origin else {
                continue;
            };
            if let Err(e) = self.orchestrator
                                .abandon_review(origin.workflow_id, origin.phase_id, &item.review_id)
                                .await
            {
                debug!("lapsed review not pending in workflow workflow_id={} review_id={} error={e}",
                       origin.workflow_id, item.review_id);
            }
        }
    }

    pub fn purge_expired_reviews(&self) -> Result<Value, ApiError> {
        let purged = self.cips.purge_expired();
        let review_ids: Vec<&str> = purged.iter().map(|i| i.review_id.as_str()).collect();
        Ok(json!({"purged": purged.len(), "reviewIds": review_ids}))
    }
}

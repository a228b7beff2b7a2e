//! El pipeline de confianza como gate del orquestador de workflows.
use async_trait::async_trait;
use bim_core::{CoreEngineError, GateOutcome, GatedBatch, OperationGate};

use crate::cips::{BatchReport, CipsOrchestrator};
use crate::envelope::EnvelopeStatus;

impl From<&BatchReport> for GateOutcome {
    fn from(report: &BatchReport) -> Self {
        let slots = report.envelopes
                          .iter()
                          .filter_map(|e| {
                              let slot = e.slot.clone()?;
                              e.created_ids().into_iter().next().map(|id| (slot, id))
                          })
                          .collect();
        let remaining = report.envelopes
                              .iter()
                              .filter(|e| e.status == EnvelopeStatus::Pending)
                              .map(|e| e.operation())
                              .collect();
        GateOutcome { success: report.success,
                      created_ids: report.created_ids.clone(),
                      executed: report.executed,
                      verified: report.verified,
                      failed: report.failed,
                      queued: report.queued,
                      review_ids: report.review_ids.clone(),
                      average_confidence: report.average_confidence,
                      errors: report.errors.clone(),
                      slots,
                      interrupted: report.interrupted.clone(),
                      remaining }
    }
}

#[async_trait]
impl OperationGate for CipsOrchestrator {
    fn is_enabled(&self) -> bool {
        CipsOrchestrator::is_enabled(self)
    }

    async fn process(&self, batch: GatedBatch) -> Result<GateOutcome, CoreEngineError> {
        let report = self.run_batch(batch.operations,
                                    &batch.description,
                                    batch.auto_execute,
                                    batch.origin,
                                    batch.known_ids,
                                    true)
                         .await
                         .map_err(|e| CoreEngineError::Pipeline(e.to_string()))?;
        Ok(GateOutcome::from(&report))
    }

    fn withdraw(&self, review_ids: &[String]) -> usize {
        self.withdraw_reviews(review_ids).len()
    }
}

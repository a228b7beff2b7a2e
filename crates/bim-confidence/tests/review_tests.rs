mod common;

use bim_confidence::{CipsOrchestrator, ConfidenceConfig, EnvelopeStatus, FeedbackStore, InMemoryFeedbackStore,
                     InMemoryReviewStore, PipelineError, ReviewDecision, ReviewStore};
use bim_core::{OperationOrigin, PhaseId};
use common::*;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

async fn queued(cips: &CipsOrchestrator, method: &str) -> String {
    let report = cips.process_batch(ops(&[method]), "needs review", true, None, vec![]).await.unwrap();
    report.review_ids[0].clone()
}

fn low_confidence(config: ConfidenceConfig, build: Arc<RecordingBuild>) -> CipsOrchestrator {
    CipsOrchestrator::new(config, build).unwrap().with_calculator(Arc::new(FixedCalculator(0.05)))
}

#[tokio::test]
async fn approve_executes_original_operation() {
    let build = Arc::new(RecordingBuild::default());
    let cips = low_confidence(ConfidenceConfig::default(), build.clone());
    let review_id = queued(&cips, "createStairs").await;

    let outcome = cips.submit_review(&review_id, ReviewDecision::Approve, None, None).await.unwrap();

    assert!(outcome.executed);
    assert!(outcome.success);
    assert_eq!(outcome.created_ids, vec!["el-0".to_string()]);
    assert_eq!(outcome.item.envelope.status, EnvelopeStatus::Verified);
    assert!(cips.pending_reviews().is_empty());
    assert_eq!(build.calls(), 1);
}

#[tokio::test]
async fn reject_never_calls_the_build_executor() {
    let build = Arc::new(RecordingBuild::default());
    let cips = low_confidence(ConfidenceConfig::default(), build.clone());
    let review_id = queued(&cips, "createRoof").await;

    let outcome = cips.submit_review(&review_id, ReviewDecision::Reject, None, Some("wrong slope".into()))
                      .await
                      .unwrap();

    assert!(!outcome.executed);
    assert!(outcome.created_ids.is_empty());
    assert_eq!(outcome.item.envelope.status, EnvelopeStatus::Failed);
    assert_eq!(build.calls(), 0);

    let err = cips.submit_review(&review_id, ReviewDecision::Approve, None, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::ReviewNotFound(_)));
}

#[tokio::test]
async fn approve_modified_runs_corrected_params() {
    let build = Arc::new(RecordingBuild::default());
    let cips = low_confidence(ConfidenceConfig::default(), build);
    let review_id = queued(&cips, "createWall").await;

    let err = cips.submit_review(&review_id, ReviewDecision::ApproveModified, None, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDecision(_)));
    assert_eq!(cips.pending_reviews().len(), 1, "a rejected request keeps the item queued");

    let outcome = cips.submit_review(&review_id,
                                     ReviewDecision::ApproveModified,
                                     Some(json!({"height": 3.5})),
                                     None)
                      .await
                      .unwrap();
    assert_eq!(outcome.item.envelope.params, json!({"height": 3.5}));
    assert!(outcome.success);
}

#[tokio::test]
async fn review_outcome_carries_origin_of_the_batch() {
    let cips = low_confidence(ConfidenceConfig::default(), Arc::new(RecordingBuild::default()));
    let origin = OperationOrigin { workflow_id: Uuid::new_v4(),
                                   phase_id: PhaseId(4) };
    let report = cips.process_batch(ops(&["placeDoor"]), "doors", true, Some(origin), vec![]).await.unwrap();

    let outcome = cips.submit_review(&report.review_ids[0], ReviewDecision::Approve, None, None).await.unwrap();
    assert_eq!(outcome.origin, Some(origin));
}

#[tokio::test]
async fn approvals_lower_thresholds_once_enough_samples_exist() {
    let cips = low_confidence(learning_config(2), Arc::new(RecordingBuild::default()));
    let before = cips.thresholds_for("createRoof");

    let first = queued(&cips, "createRoof").await;
    let outcome = cips.submit_review(&first, ReviewDecision::Approve, None, None).await.unwrap();
    assert_eq!(outcome.threshold_adjustment, None);

    let second = queued(&cips, "createRoof").await;
    let outcome = cips.submit_review(&second, ReviewDecision::Approve, None, None).await.unwrap();
    let adj = outcome.threshold_adjustment.expect("adjusted");
    assert!((adj + 0.02).abs() < 1e-12);

    let after = cips.thresholds_for("createRoof");
    assert!((before.high - after.high - 0.02).abs() < 1e-12);
    assert_eq!(cips.thresholds_for("createWall"), before);

    let stats = cips.feedback_stats();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.methods["createRoof"].approval_rate, 1.0);
}

#[tokio::test]
async fn adjustment_never_exceeds_configured_bound() {
    let mut config = learning_config(1);
    config.feedback.max_adjustment = 0.05;
    let cips = low_confidence(config, Arc::new(RecordingBuild::default()));

    for _ in 0..6 {
        let id = queued(&cips, "createStairs").await;
        cips.submit_review(&id, ReviewDecision::Reject, None, None).await.unwrap();
    }
    let stats = cips.feedback_stats();
    let adj = stats.methods["createStairs"].stats.adjustment;
    assert!((adj - 0.05).abs() < 1e-12);
}

#[tokio::test]
async fn stores_restore_queue_and_learned_adjustments() {
    let reviews = Arc::new(InMemoryReviewStore::new());
    let feedback = Arc::new(InMemoryFeedbackStore::new());

    let first = low_confidence(learning_config(1), Arc::new(RecordingBuild::default()))
        .with_stores(reviews.clone(), feedback.clone())
        .unwrap();
    let approved = queued(&first, "createGrid").await;
    first.submit_review(&approved, ReviewDecision::Approve, None, None).await.unwrap();
    let kept = queued(&first, "createGrid").await;
    assert_eq!(reviews.load().unwrap().len(), 1);
    assert_eq!(feedback.load().unwrap().len(), 1);

    let second = low_confidence(learning_config(1), Arc::new(RecordingBuild::default()))
        .with_stores(reviews, feedback)
        .unwrap();
    let pending = second.pending_reviews();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].review_id, kept);
    assert_eq!(second.thresholds_for("createGrid"), first.thresholds_for("createGrid"));
}

//! Persistencia de la cola de revisión y del feedback en archivos JSON.

use async_trait::async_trait;
use bim_confidence::{CipsOrchestrator, ConfidenceCalculator, ConfidenceConfig, ConfidenceEnvelope, ConfidenceScore,
                     FeedbackRecord, FeedbackStore, PipelineError, ReviewDecision, ReviewQueueManager, ReviewStore,
                     ScoringContext};
use bim_core::{AtomicOperation, BuildExecutor, ExecutorError};
use bim_persistence::{JsonFileFeedbackStore, JsonFileReviewStore, StorageConfig};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

struct EchoBuild;

#[async_trait]
impl BuildExecutor for EchoBuild {
    async fn execute(&self, method: &str, _params: &Value) -> Result<Map<String, Value>, ExecutorError> {
        let mut m = Map::new();
        m.insert("elementId".into(), json!(format!("{method}-1")));
        Ok(m)
    }
}

struct LowConfidence;

impl ConfidenceCalculator for LowConfidence {
    fn score(&self, _method: &str, _params: &Value, _ctx: &ScoringContext) -> Result<ConfidenceScore, PipelineError> {
        Ok(ConfidenceScore { value: 0.05,
                             factors: BTreeMap::new() })
    }
}

fn pipeline(dir: &std::path::Path) -> CipsOrchestrator {
    let mut config = ConfidenceConfig::default();
    config.feedback.min_samples_to_learn = 1;
    let reviews = Arc::new(JsonFileReviewStore::new(dir.join("reviews.json")));
    let feedback = Arc::new(JsonFileFeedbackStore::new(dir.join("feedback.json")));
    CipsOrchestrator::new(config, Arc::new(EchoBuild)).unwrap()
                                                      .with_calculator(Arc::new(LowConfidence))
                                                      .with_stores(reviews, feedback)
                                                      .unwrap()
}

#[test]
fn review_items_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileReviewStore::new(dir.path().join("reviews.json"));
    let mut queue = ReviewQueueManager::new(10, 24);
    let op = AtomicOperation::new("createRoof", json!({"levelId": "L2", "boundary": []})).with_description("roof");
    let (item, _) = queue.enqueue(ConfidenceEnvelope::pending(op, None));

    store.save(&[item.clone()]).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded, vec![item]);
}

#[test]
fn feedback_records_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileFeedbackStore::new(dir.path().join("deep/feedback.json"));
    let records = vec![FeedbackRecord { review_id: "r-1".into(),
                                        method: "createWall".into(),
                                        decision: ReviewDecision::ApproveModified,
                                        original_confidence: 0.42,
                                        notes: Some("shift to grid line B".into()),
                                        modified_params: Some(json!({"start": [0, 5], "end": [10, 5]})),
                                        timestamp: Utc::now() }];
    store.save(&records).unwrap();
    assert_eq!(store.load().unwrap(), records);
}

#[test]
fn corrupt_file_surfaces_as_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reviews.json");
    std::fs::write(&path, "[{\"reviewId\": 1").unwrap();
    let err = JsonFileReviewStore::new(&path).load().unwrap_err();
    assert!(matches!(err, bim_confidence::StoreError::Serialization(_)));
}

#[tokio::test]
async fn pending_reviews_and_feedback_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = pipeline(dir.path());
    let report = first.process_batch(vec![AtomicOperation::new("createStairs", json!({})),
                                          AtomicOperation::new("createRoof", json!({}))],
                                     "vertical circulation",
                                     true,
                                     None,
                                     vec![])
                      .await
                      .unwrap();
    assert_eq!(report.queued, 2);
    first.submit_review(&report.review_ids[0], ReviewDecision::Reject, None, None).await.unwrap();
    let adjusted = first.thresholds_for("createStairs");
    drop(first);

    let second = pipeline(dir.path());
    let pending = second.pending_reviews();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].review_id, report.review_ids[1]);
    assert_eq!(second.feedback_stats().total_records, 1);
    assert_eq!(second.thresholds_for("createStairs"), adjusted);
}

#[tokio::test]
async fn reviewer_decision_is_persisted_with_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let cips = pipeline(dir.path());
    let report = cips.process_batch(vec![AtomicOperation::new("createWall", json!({"start": [0, 0]}))],
                                    "wall",
                                    true,
                                    None,
                                    vec![])
                     .await
                     .unwrap();
    let fixed = json!({"start": [0, 0], "end": [8, 0]});

    let outcome = cips.submit_review(&report.review_ids[0],
                                     ReviewDecision::ApproveModified,
                                     Some(fixed.clone()),
                                     Some("end point was missing".into()))
                      .await
                      .unwrap();
    assert_eq!(outcome.item.decision, Some(ReviewDecision::ApproveModified));
    assert_eq!(outcome.item.notes.as_deref(), Some("end point was missing"));
    assert_eq!(outcome.item.modified_params.as_ref(), Some(&fixed));
    assert_eq!(outcome.item.envelope.params, fixed);
    drop(cips);

    let records = JsonFileFeedbackStore::new(dir.path().join("feedback.json")).load().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, ReviewDecision::ApproveModified);
    assert_eq!(records[0].notes.as_deref(), Some("end point was missing"));
    assert_eq!(records[0].modified_params, Some(fixed));
}

#[test]
fn storage_paths_fall_back_to_config_file_values() {
    let cfg = StorageConfig::default().or_paths(Some("q.json"), None);
    assert_eq!(cfg.review_queue_path.as_deref(), Some(std::path::Path::new("q.json")));
    assert!(cfg.feedback_path.is_none());
}

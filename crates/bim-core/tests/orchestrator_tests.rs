mod common;

use bim_core::{CoreEngineError, ExecutionMode, OperationGate, PhaseErrorKind, PhaseId, PhaseStatus, ReviewVerdict,
               WorkflowConfig, WorkflowEventKind, WorkflowOrchestrator, WorkflowStatus};
use std::sync::atomic::Ordering;
use common::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(b_methods: Vec<&'static str>,
                gate: Option<Arc<dyn OperationGate>>,
                timeout: Option<Duration>)
                -> WorkflowOrchestrator {
    let mut builder = WorkflowOrchestrator::builder(abc_catalog(), Arc::new(CountingBuild::default()))
        .executors(abc_executors(b_methods));
    if let Some(gate) = gate {
        builder = builder.gate(gate);
    }
    if let Some(timeout) = timeout {
        builder = builder.operation_timeout(timeout);
    }
    builder.build().unwrap()
}

fn direct_config() -> WorkflowConfig {
    WorkflowConfig { use_confidence_gating: false,
                     ..WorkflowConfig::default() }
}

#[tokio::test]
async fn execute_all_runs_phases_in_catalog_order() {
    let orch = orchestrator(vec!["makeB", "makeB2"], None, None);
    let wf = orch.create_workflow(json!({}), None, direct_config());
    assert_eq!(wf.next_phase.as_deref(), Some("A"));

    let summary = orch.execute_all(wf.workflow_id, Some(true)).await.unwrap();
    let order: Vec<u32> = summary.results.iter().map(|r| r.phase_id.0).collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert!(summary.workflow_complete);
    assert_eq!(summary.workflow_status, WorkflowStatus::Completed);
    assert_eq!(summary.total_elements_created, 4);

    let snap = orch.snapshot(wf.workflow_id).await.unwrap();
    let per_phase: usize = snap.phases.iter().map(|p| p.created_ids.len()).sum();
    assert_eq!(snap.total_elements_created, per_phase);
    assert_eq!(snap.registry.get("b"), Some(&2));
    assert_eq!(snap.progress.percent, 100.0);
    assert!(snap.next_phase.is_none());
}

#[tokio::test]
async fn execute_phase_with_unsatisfied_dependency_leaves_state_untouched() {
    let orch = orchestrator(vec!["makeB"], None, None);
    let wf = orch.create_workflow(json!({}), None, direct_config());
    let before = orch.state(wf.workflow_id).await.unwrap();

    let err = orch.execute_phase(wf.workflow_id, PhaseId(1)).await.unwrap_err();
    match err {
        CoreEngineError::DependenciesNotSatisfied { phase, missing } => {
            assert_eq!(phase, "B");
            assert_eq!(missing, vec!["A".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let after = orch.state(wf.workflow_id).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(orch.events_for(wf.workflow_id).len(), 1);
}

#[tokio::test]
async fn executor_failure_becomes_failed_phase() {
    let orch = orchestrator(vec!["fail"], None, None);
    let config = WorkflowConfig { stop_on_error: false,
                                  ..direct_config() };
    let wf = orch.create_workflow(json!({}), None, config);
    let summary = orch.execute_all(wf.workflow_id, None).await.unwrap();

    // B falla, C depende de B y no llega a intentarse
    assert_eq!(summary.phases_executed, 2);
    assert_eq!(summary.phases_failed, 1);
    assert!(!summary.workflow_complete);
    assert_eq!(summary.workflow_status, WorkflowStatus::InProgress);
    let b = &summary.results[1];
    assert_eq!(b.status, PhaseStatus::Failed);
    assert!(b.error.as_deref().unwrap_or_default().contains("simulated failure"));

    let snap = orch.snapshot(wf.workflow_id).await.unwrap();
    assert_eq!(snap.failures.len(), 1);
    assert_eq!(snap.next_phase.as_deref(), Some("B"));
}

#[tokio::test]
async fn stop_on_error_marks_workflow_failed() {
    let orch = orchestrator(vec!["fail"], None, None);
    let wf = orch.create_workflow(json!({}), None, direct_config());
    let summary = orch.execute_all(wf.workflow_id, Some(true)).await.unwrap();
    assert_eq!(summary.workflow_status, WorkflowStatus::Failed);
    let events = orch.events_for(wf.workflow_id);
    assert!(events.iter().any(|e| matches!(e.kind, WorkflowEventKind::WorkflowFailed { .. })));
}

#[tokio::test]
async fn timeout_fails_the_phase() {
    let orch = orchestrator(vec!["slow"], None, Some(Duration::from_millis(20)));
    let wf = orch.create_workflow(json!({}), None, direct_config());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();
    let exec = orch.execute_next_phase(wf.workflow_id).await.unwrap().expect("phase B");
    assert_eq!(exec.phase.status, PhaseStatus::Failed);
    assert!(exec.phase.error.unwrap_or_default().contains("timed out"));
}

#[tokio::test]
async fn pipeline_error_falls_back_to_direct_execution() {
    let orch = orchestrator(vec!["makeB"], Some(Arc::new(BrokenGate)), None);
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    let exec = orch.execute_next_phase(wf.workflow_id).await.unwrap().expect("phase A");
    assert_eq!(exec.phase.status, PhaseStatus::Completed);
    assert_eq!(exec.phase.execution_mode, Some(ExecutionMode::Fallback));
    assert!(exec.phase.warnings.iter().any(|w| w.contains("fallback")));
    let events = orch.events_for(wf.workflow_id);
    assert!(events.iter().any(|e| matches!(e.kind, WorkflowEventKind::ConfidenceFallback { .. })));
}

#[tokio::test]
async fn review_resolution_completes_waiting_phase() {
    let orch = orchestrator(vec!["makeB"], Some(Arc::new(QueueAllGate)), None);
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    let summary = orch.execute_all(wf.workflow_id, None).await.unwrap();
    // A queda en revisión y bloquea a B
    assert_eq!(summary.phases_awaiting_review, 1);
    assert_eq!(summary.phases_executed, 1);
    assert!(!summary.workflow_complete);

    let a = orch.snapshot(wf.workflow_id).await.unwrap().phases[0].clone();
    assert_eq!(a.status, PhaseStatus::RequiresReview);
    assert_eq!(a.pending_reviews, vec!["review-0".to_string()]);

    let verdict = ReviewVerdict::Applied { created_ids: vec!["a-approved".into()],
                                           slot: None };
    let exec = orch.apply_review_resolution(wf.workflow_id, PhaseId(0), "review-0", verdict)
                   .await
                   .unwrap();
    assert_eq!(exec.phase.status, PhaseStatus::Completed);
    assert_eq!(exec.elements_created, 1);
    assert_eq!(exec.next_phase.as_deref(), Some("B"));
}

#[tokio::test]
async fn failed_approval_fails_the_phase_instead_of_completing_it() {
    let orch = orchestrator(vec!["makeB"], Some(Arc::new(QueueAllGate)), None);
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();

    let verdict = ReviewVerdict::Failed { error: "makeA failed: simulated failure".into() };
    let exec = orch.apply_review_resolution(wf.workflow_id, PhaseId(0), "review-0", verdict)
                   .await
                   .unwrap();
    assert_eq!(exec.phase.status, PhaseStatus::Failed);
    assert_eq!(exec.phase.error_kind, Some(PhaseErrorKind::Executor));
    assert!(exec.phase.created_ids.is_empty());
    assert_eq!(exec.next_phase.as_deref(), Some("A"));
    let events = orch.events_for(wf.workflow_id);
    assert!(events.iter().any(|e| matches!(e.kind, WorkflowEventKind::PhaseFailed { .. })));
    assert!(!events.iter().any(|e| matches!(e.kind, WorkflowEventKind::PhaseCompleted { .. })));
}

#[tokio::test]
async fn rerun_withdraws_stale_reviews_and_rejects_late_resolutions() {
    let orch = orchestrator(vec!["makeB"], Some(Arc::new(QueueAllGate)), None);
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();
    let again = orch.execute_next_phase(wf.workflow_id).await.unwrap().expect("phase A again");
    assert_eq!(again.phase.pending_reviews, vec!["review-0".to_string()]);
    assert_eq!(again.phase.attempts, 2);

    let withdrawn: Vec<_> = orch.events_for(wf.workflow_id)
                                .into_iter()
                                .filter_map(|e| match e.kind {
                                    WorkflowEventKind::ReviewsWithdrawn { review_ids, .. } => Some(review_ids),
                                    _ => None,
                                })
                                .collect();
    assert_eq!(withdrawn, vec![vec!["review-0".to_string()]]);

    let err = orch.apply_review_resolution(wf.workflow_id, PhaseId(0), "review-7", ReviewVerdict::Rejected)
                  .await
                  .unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(_)));
    let snap = orch.snapshot(wf.workflow_id).await.unwrap();
    assert_eq!(snap.phases[0].status, PhaseStatus::RequiresReview);
}

#[tokio::test]
async fn interrupted_pipeline_runs_only_the_remaining_operations() {
    let build = Arc::new(CountingBuild::default());
    let executors = abc_executors(vec!["makeB", "makeB2"]);
    let orch = WorkflowOrchestrator::builder(abc_catalog(), build.clone()).executors(executors)
                                                                          .gate(Arc::new(InterruptedGate))
                                                                          .build()
                                                                          .unwrap();
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();
    assert_eq!(build.calls.load(Ordering::SeqCst), 0);

    let exec = orch.execute_next_phase(wf.workflow_id).await.unwrap().expect("phase B");
    assert_eq!(exec.phase.status, PhaseStatus::Completed);
    assert_eq!(exec.phase.execution_mode, Some(ExecutionMode::Fallback));
    assert_eq!(exec.phase.created_ids, vec!["gated-makeB".to_string(), "makeB2-0".to_string()]);
    assert_eq!(build.calls.load(Ordering::SeqCst), 1);
    assert!(exec.phase.warnings.iter().any(|w| w.contains("after partial execution")));
}

#[tokio::test]
async fn lapsed_review_leaves_phase_waiting_and_rerunnable() {
    let orch = orchestrator(vec!["makeB"], Some(Arc::new(QueueAllGate)), None);
    let wf = orch.create_workflow(json!({}), None, WorkflowConfig::default());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();

    let exec = orch.abandon_review(wf.workflow_id, PhaseId(0), "review-0").await.unwrap();
    assert_eq!(exec.phase.status, PhaseStatus::RequiresReview);
    assert!(exec.phase.pending_reviews.is_empty());
    assert_eq!(exec.next_phase.as_deref(), Some("A"));
    let events = orch.events_for(wf.workflow_id);
    assert!(events.iter().any(|e| matches!(e.kind, WorkflowEventKind::ReviewLapsed { .. })));
}

#[tokio::test]
async fn executor_failures_are_tagged_by_kind() {
    let orch = orchestrator(vec!["fail"], None, None);
    let wf = orch.create_workflow(json!({}), None, direct_config());
    orch.execute_next_phase(wf.workflow_id).await.unwrap();
    let exec = orch.execute_next_phase(wf.workflow_id).await.unwrap().expect("phase B");
    assert_eq!(exec.phase.status, PhaseStatus::Failed);
    assert_eq!(exec.phase.error_kind, Some(PhaseErrorKind::Executor));
}

#[tokio::test]
async fn skip_and_delete_lifecycle() {
    let orch = orchestrator(vec!["makeB"], None, None);
    let wf = orch.create_workflow(json!({}), None, direct_config());
    let skipped = orch.skip_phase(wf.workflow_id, PhaseId(0), "exists already").await.unwrap();
    assert_eq!(skipped.phase.status, PhaseStatus::Skipped);
    assert_eq!(skipped.next_phase.as_deref(), Some("B"));
    assert_eq!(orch.list_workflows().await.len(), 1);

    orch.delete_workflow(wf.workflow_id).await.unwrap();
    assert!(matches!(orch.snapshot(wf.workflow_id).await, Err(CoreEngineError::WorkflowNotFound(_))));
    assert!(orch.list_workflows().await.is_empty());
    // los eventos sobreviven a la eliminación
    let events = orch.events_for(wf.workflow_id);
    assert!(matches!(events.last().map(|e| &e.kind), Some(WorkflowEventKind::WorkflowDeleted)));
}

#[test]
fn build_requires_an_executor_per_phase() {
    let partial = abc_executors(vec!["x"]).into_iter().take(2);
    let res = WorkflowOrchestrator::builder(abc_catalog(), Arc::new(CountingBuild::default())).executors(partial)
                                                                                               .build();
    assert!(matches!(res, Err(CoreEngineError::InvalidCatalog(_))));
}

mod common;

use bim_core::{PhaseCatalog, PhaseDefinition, PhaseId, PhaseStatus, WorkflowConfig, WorkflowState};
use common::abc_catalog;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

/// Catálogo con diamante y opcionales: 0 -> {1, 2} -> 3, 4 opcional de 0.
fn diamond() -> PhaseCatalog {
    PhaseCatalog::new(vec![PhaseDefinition::new(0, "Base", "base"),
                           PhaseDefinition::new(1, "Left", "left").depends_on(&[0]),
                           PhaseDefinition::new(2, "Right", "right").depends_on(&[0]),
                           PhaseDefinition::new(3, "Top", "top").depends_on(&[1, 2]),
                           PhaseDefinition::new(4, "Extra", "extra").depends_on(&[0]).optional()]).unwrap()
}

/// Recorre todas las combinaciones de estados terminales y comprueba que la
/// fase elegida nunca tenga dependencias pendientes, y que no se elija
/// ninguna sólo cuando todas las relevantes estén completadas u omitidas.
#[test]
fn next_eligible_never_returns_unsatisfied_phase() {
    let cat = diamond();
    let statuses = [PhaseStatus::NotStarted, PhaseStatus::Completed, PhaseStatus::Failed, PhaseStatus::Skipped];
    for skip_optional in [false, true] {
        let config = WorkflowConfig { skip_optional,
                                      ..WorkflowConfig::default() };
        for combo in 0..statuses.len().pow(cat.len() as u32) {
            let mut st = WorkflowState::new(Uuid::new_v4(), json!({}), None, config, &cat);
            let mut c = combo;
            for def in cat.phases() {
                let target = statuses[c % statuses.len()];
                c /= statuses.len();
                drive(&mut st, def.id, target);
            }
            match cat.next_eligible(&st) {
                Some(def) => {
                    assert!(cat.unsatisfied_dependencies(def, &st).is_empty());
                    assert!(st.status_of(def.id).is_pending());
                }
                None => {
                    for def in cat.phases().iter().filter(|d| cat.is_relevant(d, &st)) {
                        assert!(st.status_of(def.id).satisfies_dependency(), "phase {} left pending", def.name);
                    }
                }
            }
        }
    }
}

fn drive(st: &mut WorkflowState, id: PhaseId, target: PhaseStatus) {
    match target {
        PhaseStatus::Completed => {
            st.start_phase(id).unwrap();
            st.complete_phase(id, "x", vec![], bim_core::ExecutionMode::Direct, None, vec![]).unwrap();
        }
        PhaseStatus::Failed => {
            st.start_phase(id).unwrap();
            st.fail_phase(id, "e", false).unwrap();
        }
        PhaseStatus::Skipped => {
            st.skip_phase(id, "test").unwrap();
        }
        _ => {}
    }
}

#[test]
fn exclusion_set_moves_to_next_candidate() {
    let cat = diamond();
    let mut st = WorkflowState::new(Uuid::new_v4(), json!({}), None, WorkflowConfig::default(), &cat);
    drive(&mut st, PhaseId(0), PhaseStatus::Completed);
    let mut exclude = HashSet::new();
    assert_eq!(cat.next_eligible_excluding(&st, &exclude).map(|d| d.id), Some(PhaseId(1)));
    exclude.insert(PhaseId(1));
    assert_eq!(cat.next_eligible_excluding(&st, &exclude).map(|d| d.id), Some(PhaseId(2)));
    exclude.insert(PhaseId(2));
    // Top depende de Left y Right, que siguen pendientes
    assert_eq!(cat.next_eligible_excluding(&st, &exclude).map(|d| d.id), Some(PhaseId(4)));
}

#[test]
fn declared_order_is_topological() {
    for cat in [diamond(), abc_catalog()] {
        assert!(cat.is_topologically_sorted());
        let graph = cat.dependency_graph();
        let pos = |id: PhaseId| cat.phases().iter().position(|p| p.id == id).unwrap();
        assert!(graph.edges.iter().all(|e| pos(e.from) < pos(e.to)));
    }
}

#[test]
fn state_roundtrip_preserves_statuses_and_buckets() {
    let cat = diamond();
    let mut st = WorkflowState::new(Uuid::new_v4(), json!({"numberOfStories": 2}), Some("h".into()), WorkflowConfig::default(), &cat);
    st.start_phase(PhaseId(0)).unwrap();
    st.complete_phase(PhaseId(0), "base", vec!["b1".into(), "b2".into()], bim_core::ExecutionMode::Gated, Some(0.9), vec![])
      .unwrap();
    st.start_phase(PhaseId(1)).unwrap();
    st.fail_phase(PhaseId(1), "boom", false).unwrap();
    st.skip_phase(PhaseId(4), "not needed").unwrap();

    let text = serde_json::to_string(&st).unwrap();
    let back: WorkflowState = serde_json::from_str(&text).unwrap();
    for def in cat.phases() {
        assert_eq!(back.status_of(def.id), st.status_of(def.id));
    }
    assert_eq!(back.registry().counts(), st.registry().counts());
    assert_eq!(back.total_elements_created(), 2);
    assert_eq!(back, st);
}

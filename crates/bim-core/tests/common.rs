#![allow(dead_code)]
//! Dobles de prueba compartidos por los tests de integración del core.

use async_trait::async_trait;
use bim_core::{AtomicOperation, BuildExecutor, CoreEngineError, ExecutorError, GateOutcome, GatedBatch, OperationGate,
               PhaseCatalog, PhaseContext, PhaseDefinition, PhaseExecutor, PhaseId};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ejecutor de construcción que numera los elementos creados. `fail` falla y
/// `slow` tarda más que cualquier timeout de test.
#[derive(Default)]
pub struct CountingBuild {
    pub calls: AtomicUsize,
}

#[async_trait]
impl BuildExecutor for CountingBuild {
    async fn execute(&self, method: &str, _params: &Value) -> Result<Map<String, Value>, ExecutorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match method {
            "fail" => Err(ExecutorError::Failed("simulated failure".into())),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Map::new())
            }
            _ => {
                let mut m = Map::new();
                m.insert("elementId".into(), json!(format!("{method}-{n}")));
                Ok(m)
            }
        }
    }
}

/// Fase que emite una operación por método listado.
pub struct ListPhase {
    pub id: u32,
    pub methods: Vec<&'static str>,
}

impl PhaseExecutor for ListPhase {
    fn phase_id(&self) -> PhaseId {
        PhaseId(self.id)
    }

    fn operations(&self, _ctx: &PhaseContext) -> Result<Vec<AtomicOperation>, CoreEngineError> {
        Ok(self.methods.iter().map(|m| AtomicOperation::new(m, json!({}))).collect())
    }
}

/// A(0) -> B(1) -> C(2, opcional)
pub fn abc_catalog() -> PhaseCatalog {
    PhaseCatalog::new(vec![PhaseDefinition::new(0, "A", "a"),
                           PhaseDefinition::new(1, "B", "b").depends_on(&[0]),
                           PhaseDefinition::new(2, "C", "c").depends_on(&[1]).optional()]).unwrap()
}

pub fn abc_executors(b_methods: Vec<&'static str>) -> Vec<Arc<dyn PhaseExecutor>> {
    vec![Arc::new(ListPhase { id: 0, methods: vec!["makeA"] }),
         Arc::new(ListPhase { id: 1, methods: b_methods }),
         Arc::new(ListPhase { id: 2, methods: vec!["makeC"] })]
}

/// Gate que siempre falla (pipeline roto).
pub struct BrokenGate;

#[async_trait]
impl OperationGate for BrokenGate {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn process(&self, _batch: GatedBatch) -> Result<GateOutcome, CoreEngineError> {
        Err(CoreEngineError::Pipeline("scorer unavailable".into()))
    }
}

/// Gate que manda todo a revisión, devolviendo un review id por operación.
pub struct QueueAllGate;

#[async_trait]
impl OperationGate for QueueAllGate {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn process(&self, batch: GatedBatch) -> Result<GateOutcome, CoreEngineError> {
        let n = batch.operations.len();
        Ok(GateOutcome { success: true,
                         queued: n,
                         review_ids: (0..n).map(|i| format!("review-{i}")).collect(),
                         average_confidence: Some(0.2),
                         ..GateOutcome::default() })
    }
}

/// Gate que ejecuta la primera operación del lote y se corta antes de
/// procesar el resto.
pub struct InterruptedGate;

#[async_trait]
impl OperationGate for InterruptedGate {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn process(&self, batch: GatedBatch) -> Result<GateOutcome, CoreEngineError> {
        let mut operations = batch.operations.into_iter();
        let first = operations.next().map(|op| format!("gated-{}", op.method));
        Ok(GateOutcome { success: true,
                         executed: first.iter().count(),
                         created_ids: first.into_iter().collect(),
                         interrupted: Some("scorer lost its model".into()),
                         remaining: operations.collect(),
                         ..GateOutcome::default() })
    }
}

//! Builder para `WorkflowOrchestrator`.
//!
//! Reúne catálogo, ejecutores de fase, ejecutor de construcción, gate de
//! confianza opcional y stores. `build` verifica que cada fase del catálogo
//! tenga exactamente un ejecutor, de modo que un orquestador construido nunca
//! encuentra una fase sin ejecutor en tiempo de ejecución.
//!
//! ```ignore
//! let orchestrator = WorkflowOrchestrator::builder(catalog, build)
//!     .executors(standard_executors())
//!     .gate(cips)
//!     .operation_timeout(Duration::from_secs(5))
//!     .build()?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::gate::OperationGate;
use crate::engine::WorkflowOrchestrator;
use crate::errors::CoreEngineError;
use crate::event::{EventStore, InMemoryEventStore};
use crate::phase::{BuildExecutor, PhaseCatalog, PhaseExecutor, PhaseId};
use crate::repo::{InMemoryWorkflowRepository, WorkflowRepository};

pub struct OrchestratorBuilder<R = InMemoryWorkflowRepository, E = InMemoryEventStore>
    where R: WorkflowRepository,
          E: EventStore
{
    pub(crate) catalog: PhaseCatalog,
    pub(crate) executors: Vec<Arc<dyn PhaseExecutor>>,
    pub(crate) build: Arc<dyn BuildExecutor>,
    pub(crate) gate: Option<Arc<dyn OperationGate>>,
    pub(crate) repository: R,
    pub(crate) events: E,
    pub(crate) operation_timeout: Duration,
}

impl<R, E> OrchestratorBuilder<R, E>
    where R: WorkflowRepository,
          E: EventStore
{
    pub fn executor(mut self, executor: Arc<dyn PhaseExecutor>) -> Self {
        self.executors.push(executor);
        self
    }

    pub fn executors<I>(mut self, executors: I) -> Self
        where I: IntoIterator<Item = Arc<dyn PhaseExecutor>>
    {
        self.executors.extend(executors);
        self
    }

    pub fn gate(mut self, gate: Arc<dyn OperationGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Sustituye repositorio y event store.
    pub fn with_stores<R2, E2>(self, repository: R2, events: E2) -> OrchestratorBuilder<R2, E2>
        where R2: WorkflowRepository,
              E2: EventStore
    {
        OrchestratorBuilder { catalog: self.catalog,
                              executors: self.executors,
                              build: self.build,
                              gate: self.gate,
                              repository,
                              events,
                              operation_timeout: self.operation_timeout }
    }

    pub fn build(self) -> Result<WorkflowOrchestrator<R, E>, CoreEngineError> {
        let mut executors: HashMap<PhaseId, Arc<dyn PhaseExecutor>> = HashMap::new();
        for executor in self.executors {
            let id = executor.phase_id();
            if self.catalog.get(id).is_none() {
                return Err(CoreEngineError::InvalidCatalog(format!("executor registered for unknown phase {id}")));
            }
            if executors.insert(id, executor).is_some() {
                return Err(CoreEngineError::InvalidCatalog(format!("more than one executor for phase {id}")));
            }
        }
        if let Some(missing) = self.catalog.phases().iter().find(|p| !executors.contains_key(&p.id)) {
            return Err(CoreEngineError::InvalidCatalog(format!("no executor registered for phase '{}'",
                                                               missing.name)));
        }
        Ok(WorkflowOrchestrator { catalog: Arc::new(self.catalog),
                                  executors,
                                  build: self.build,
                                  gate: self.gate,
                                  repository: self.repository,
                                  events: self.events,
                                  operation_timeout: self.operation_timeout })
    }
}

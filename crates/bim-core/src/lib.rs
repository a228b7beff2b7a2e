//! bim-core: orquestador neutral de workflows por fases con dependencias.
//!
//! No conoce geometría ni umbrales de confianza: recibe un catálogo de fases,
//! un ejecutor por fase, un ejecutor de construcción opaco y, opcionalmente,
//! un gate que decide qué operaciones se ejecutan y cuáles esperan revisión.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod model;
pub mod phase;
pub mod repo;

pub use engine::{ExecuteAllSummary, GateOutcome, GatedBatch, OperationGate, OrchestratorBuilder, PhaseExecution,
                 ReviewVerdict, WorkflowOrchestrator, WorkflowSnapshot, WorkflowSummary};
pub use errors::{CoreEngineError, ExecutorError};
pub use event::{EventStore, InMemoryEventStore, WorkflowEvent, WorkflowEventKind};
pub use model::{Progress, Registry, WorkflowConfig, WorkflowState, WorkflowStatus};
pub use phase::{AtomicOperation, BuildExecutor, DependencyGraph, ExecutionMode, OperationOrigin, PhaseCatalog,
                PhaseContext, PhaseDefinition, PhaseErrorKind, PhaseExecutor, PhaseId, PhaseOutput, PhaseResult,
                PhaseStatus};
pub use repo::{InMemoryWorkflowRepository, WorkflowRepository};

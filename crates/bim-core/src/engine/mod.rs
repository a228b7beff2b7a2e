//! Orquestador de workflows por fases.
//!
//! Provee el orquestador, su builder, el contrato del gate de confianza y los
//! tipos de resumen que devuelven las operaciones públicas.

pub mod builder;
pub mod core;
pub mod gate;
pub mod summary;

pub use builder::OrchestratorBuilder;
pub use core::WorkflowOrchestrator;
pub use gate::{GateOutcome, GatedBatch, OperationGate, ReviewVerdict};
pub use summary::{ExecuteAllSummary, PhaseExecution, WorkflowSnapshot, WorkflowSummary};

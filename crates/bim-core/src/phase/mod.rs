//! Fases de construcción: definición, estado, resultado, catálogo ordenado y
//! contratos de ejecución.

mod catalog;
mod definition;
mod executor;
mod operation;
mod result;
mod status;

pub use catalog::{DependencyEdge, DependencyGraph, DependencyNode, PhaseCatalog};
pub use definition::{PhaseDefinition, PhaseId};
pub use executor::{call_with_timeout, created_ids, execute_operations_direct, validate_required_inputs, BuildExecutor,
                   PhaseContext, PhaseExecutor, PhaseOutput};
pub use operation::{AtomicOperation, OperationOrigin};
pub use result::{ExecutionMode, PhaseErrorKind, PhaseResult};
pub use status::PhaseStatus;

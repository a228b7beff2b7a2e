//! Repositorio de workflows: dueño de los `WorkflowState` vivos.

mod types;

pub use types::{InMemoryWorkflowRepository, SharedWorkflow, WorkflowRepository};

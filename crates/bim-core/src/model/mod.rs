//! Modelos neutrales del workflow (estado, registro de elementos, flags).

mod config;
mod progress;
mod registry;
mod state;

pub use config::WorkflowConfig;
pub use progress::Progress;
pub use registry::Registry;
pub use state::{PhaseFailure, WorkflowState, WorkflowStatus};

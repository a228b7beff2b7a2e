use serde::{Deserialize, Serialize};

/// Flags por workflow, fijados en la creación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowConfig {
    /// Omite las fases opcionales (no cuentan para el progreso).
    pub skip_optional: bool,
    /// Permite que las operaciones de alta confianza se ejecuten sin revisión.
    pub auto_execute_high_confidence: bool,
    /// Una fase fallida marca el workflow como `Failed` y detiene `execute_all`.
    pub stop_on_error: bool,
    /// Enruta las operaciones de cada fase por el gate de confianza.
    pub use_confidence_gating: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { skip_optional: false,
               auto_execute_high_confidence: true,
               stop_on_error: true,
               use_confidence_gating: true }
    }
}

use serde::{Deserialize, Serialize};

/// Avance de un workflow sobre el conjunto de fases relevantes (las
/// opcionales quedan fuera si el workflow las omite).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_phases: usize,
    pub relevant_phases: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub requires_review: usize,
    pub in_progress: usize,
    pub not_started: usize,
    /// (completadas + omitidas) / relevantes, en porcentaje con dos decimales.
    pub percent: f64,
}

use serde::{Deserialize, Serialize};

/// Estado de una fase dentro de un workflow.
///
/// Transiciones válidas:
/// - `NotStarted` | `Failed` | `RequiresReview` | `Completed` -> `InProgress`
/// - `InProgress` -> `Completed` | `Failed` | `RequiresReview`
/// - `RequiresReview` -> `Completed` (al resolverse la última revisión)
/// - cualquier estado distinto de `Completed` e `InProgress` -> `Skipped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    Skipped,
    /// Parte de las operaciones espera decisión humana en la cola de revisión.
    RequiresReview,
}

impl PhaseStatus {
    /// Una dependencia se considera satisfecha si está completada u omitida.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Skipped)
    }

    /// `true` si la fase todavía puede elegirse como siguiente.
    pub fn is_pending(&self) -> bool {
        !self.satisfies_dependency()
    }

    pub fn can_start(&self) -> bool {
        !matches!(self, PhaseStatus::InProgress | PhaseStatus::Skipped)
    }

    pub fn can_skip(&self) -> bool {
        !matches!(self, PhaseStatus::Completed | PhaseStatus::InProgress)
    }
}

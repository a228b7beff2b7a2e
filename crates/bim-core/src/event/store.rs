use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{WorkflowEvent, WorkflowEventKind};

/// Almacenamiento de eventos append-only. Compartido entre tareas, por eso
/// opera sobre `&self`.
pub trait EventStore: Send + Sync {
    /// Agrega un evento a partir de su kind y devuelve el evento completo (con seq y ts).
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> WorkflowEvent;
    /// Lista eventos de un workflow (orden ascendente por seq).
    fn list(&self, workflow_id: Uuid) -> Vec<WorkflowEvent>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<WorkflowEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> WorkflowEvent {
        let mut events = self.inner.entry(workflow_id).or_default();
        let seq = events.len() as u64;
        let ev = WorkflowEvent { seq,
                                 workflow_id,
                                 kind,
                                 ts: Utc::now() };
        events.push(ev.clone());
        ev
    }

    fn list(&self, workflow_id: Uuid) -> Vec<WorkflowEvent> {
        self.inner.get(&workflow_id).map(|v| v.value().clone()).unwrap_or_default()
    }
}

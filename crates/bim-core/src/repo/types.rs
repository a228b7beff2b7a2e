//! Repositorio en memoria con un lock por workflow.
//!
//! Cada estado vive detrás de su propio `tokio::sync::Mutex`: workflows
//! independientes avanzan en paralelo y las operaciones sobre un mismo
//! workflow quedan serializadas (el lock se mantiene mientras corre una fase).
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::WorkflowState;

pub type SharedWorkflow = Arc<Mutex<WorkflowState>>;

pub trait WorkflowRepository: Send + Sync {
    /// Inserta un estado nuevo y devuelve su handle compartido.
    fn insert(&self, state: WorkflowState) -> SharedWorkflow;
    fn get(&self, id: Uuid) -> Option<SharedWorkflow>;
    /// Ids en orden de creación.
    fn ids(&self) -> Vec<Uuid>;
    /// Elimina explícitamente un workflow. Nunca se invoca implícitamente.
    fn remove(&self, id: Uuid) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    inner: DashMap<Uuid, (u64, SharedWorkflow)>,
    next_ordinal: std::sync::atomic::AtomicU64,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn insert(&self, state: WorkflowState) -> SharedWorkflow {
        let ordinal = self.next_ordinal.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let id = state.id;
        let shared = Arc::new(Mutex::new(state));
        self.inner.insert(id, (ordinal, shared.clone()));
        shared
    }

    fn get(&self, id: Uuid) -> Option<SharedWorkflow> {
        self.inner.get(&id).map(|e| e.value().1.clone())
    }

    fn ids(&self) -> Vec<Uuid> {
        let mut entries: Vec<(u64, Uuid)> = self.inner.iter().map(|e| (e.value().0, *e.key())).collect();
        entries.sort_unstable();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    fn remove(&self, id: Uuid) -> bool {
        self.inner.remove(&id).is_some()
    }
}

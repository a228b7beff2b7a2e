//! Definiciones de eventos del workflow y trait EventStore.

mod store;
mod types;

pub use store::{EventStore, InMemoryEventStore};
pub use types::{WorkflowEvent, WorkflowEventKind};

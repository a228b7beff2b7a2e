//! Persistencia de la cola de revisión y del historial de feedback.
//!
//! Ambos stores guardan la colección completa en cada mutación; las
//! implementaciones en memoria sirven para tests y para correr sin disco.
use std::sync::Mutex;

use crate::errors::StoreError;
use crate::feedback::FeedbackRecord;
use crate::review::ReviewItem;

pub trait ReviewStore: Send + Sync {
    fn load(&self) -> Result<Vec<ReviewItem>, StoreError>;
    fn save(&self, items: &[ReviewItem]) -> Result<(), StoreError>;
}

pub trait FeedbackStore: Send + Sync {
    fn load(&self) -> Result<Vec<FeedbackRecord>, StoreError>;
    fn save(&self, records: &[FeedbackRecord]) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReviewStore {
    items: Mutex<Vec<ReviewItem>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<ReviewItem>) -> Self {
        Self { items: Mutex::new(items) }
    }
}

impl ReviewStore for InMemoryReviewStore {
    fn load(&self) -> Result<Vec<ReviewItem>, StoreError> {
        let guard = self.items.lock().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, items: &[ReviewItem]) -> Result<(), StoreError> {
        let mut guard = self.items.lock().map_err(|e| StoreError::Io(e.to_string()))?;
        *guard = items.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFeedbackStore {
    records: Mutex<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<FeedbackRecord>) -> Self {
        Self { records: Mutex::new(records) }
    }
}

impl FeedbackStore for InMemoryFeedbackStore {
    fn load(&self) -> Result<Vec<FeedbackRecord>, StoreError> {
        let guard = self.records.lock().map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, records: &[FeedbackRecord]) -> Result<(), StoreError> {
        let mut guard = self.records.lock().map_err(|e| StoreError::Io(e.to_string()))?;
        *guard = records.to_vec();
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use jobtrail_tracker::TimelineEvent;

use super::StoreError;

/// Append-only audit trail store.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn append(&self, event: TimelineEvent) -> Result<(), StoreError>;

    /// Events for a parent, oldest first.
    async fn list(&self, parent_ref: Uuid) -> Result<Vec<TimelineEvent>, StoreError>;
}

/// In-memory timeline store.
#[derive(Debug, Default)]
pub struct InMemoryTimelineStore {
    events: RwLock<HashMap<Uuid, Vec<TimelineEvent>>>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn append(&self, event: TimelineEvent) -> Result<(), StoreError> {
        self.events
            .write()
            .unwrap()
            .entry(event.parent_ref)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn list(&self, parent_ref: Uuid) -> Result<Vec<TimelineEvent>, StoreError> {
        let events = self.events.read().unwrap();
        let mut result = events.get(&parent_ref).cloned().unwrap_or_default();
        result.sort_by_key(|e| e.occurred_at);
        Ok(result)
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use jobtrail_core::ApplicationId;
use jobtrail_tracker::Application;

use super::StoreError;

/// Persistence seam for the application parent entity.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(&self, app: Application) -> Result<(), StoreError>;

    /// Load by id, soft-deleted records included; callers check `is_live`.
    async fn load(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;

    async fn update(&self, app: &Application) -> Result<(), StoreError>;

    /// Live applications, newest first.
    async fn list(&self) -> Result<Vec<Application>, StoreError>;
}

/// In-memory application store.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    apps: RwLock<HashMap<ApplicationId, Application>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn insert(&self, app: Application) -> Result<(), StoreError> {
        self.apps.write().unwrap().insert(app.id, app);
        Ok(())
    }

    async fn load(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        Ok(self.apps.read().unwrap().get(&id).cloned())
    }

    async fn update(&self, app: &Application) -> Result<(), StoreError> {
        let mut apps = self.apps.write().unwrap();
        if !apps.contains_key(&app.id) {
            return Err(StoreError::NotFound);
        }
        apps.insert(app.id, app.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Application>, StoreError> {
        let apps = self.apps.read().unwrap();
        let mut result: Vec<_> = apps.values().filter(|a| a.is_live()).cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use jobtrail_core::ResumeId;
use jobtrail_tracker::Resume;

use super::StoreError;

/// Persistence seam for the resume parent entity.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn insert(&self, resume: Resume) -> Result<(), StoreError>;
    async fn load(&self, id: ResumeId) -> Result<Option<Resume>, StoreError>;
    async fn update(&self, resume: &Resume) -> Result<(), StoreError>;
}

/// In-memory resume store.
#[derive(Debug, Default)]
pub struct InMemoryResumeStore {
    resumes: RwLock<HashMap<ResumeId, Resume>>,
}

impl InMemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn insert(&self, resume: Resume) -> Result<(), StoreError> {
        self.resumes.write().unwrap().insert(resume.id, resume);
        Ok(())
    }

    async fn load(&self, id: ResumeId) -> Result<Option<Resume>, StoreError> {
        Ok(self.resumes.read().unwrap().get(&id).cloned())
    }

    async fn update(&self, resume: &Resume) -> Result<(), StoreError> {
        let mut resumes = self.resumes.write().unwrap();
        if !resumes.contains_key(&resume.id) {
            return Err(StoreError::NotFound);
        }
        resumes.insert(resume.id, resume.clone());
        Ok(())
    }
}

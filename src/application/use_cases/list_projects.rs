use std::sync::Arc;

use crate::application::SnapshotStore;
use crate::domain::{DomainError, ProjectIndex, SnapshotKey};

/// Summary of one persisted (user, branch) snapshot, for CLI listing.
#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub key: SnapshotKey,
    pub name: String,
    pub root: String,
    pub file_count: u64,
    pub chunk_count: u64,
    pub updated_at: i64,
}

impl From<(SnapshotKey, ProjectIndex)> for ProjectSummary {
    fn from((key, index): (SnapshotKey, ProjectIndex)) -> Self {
        Self {
            key,
            name: index.name,
            root: index.root,
            file_count: index.stats.file_count,
            chunk_count: index.stats.chunk_count,
            updated_at: index.updated_at,
        }
    }
}

pub struct ListProjectsUseCase {
    snapshot_store: Arc<dyn SnapshotStore>,
}

impl ListProjectsUseCase {
    pub fn new(snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        Self { snapshot_store }
    }

    pub async fn execute(&self) -> Result<Vec<ProjectSummary>, DomainError> {
        let keys = self.snapshot_store.list_keys().await?;
        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(index) = self.snapshot_store.load_index(&key).await? {
                summaries.push(ProjectSummary::from((key, index)));
            }
        }
        Ok(summaries)
    }

    pub async fn get(&self, key: &SnapshotKey) -> Result<Option<ProjectIndex>, DomainError> {
        self.snapshot_store.load_index(key).await
    }
}

use std::sync::Arc;

use tracing::info;

use crate::application::{SnapshotStore, VectorStore};
use crate::domain::{DomainError, SnapshotKey};

pub struct DeleteProjectUseCase {
    snapshot_store: Arc<dyn SnapshotStore>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl DeleteProjectUseCase {
    pub fn new(snapshot_store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            snapshot_store,
            vector_store: None,
        }
    }

    pub fn with_vector_store(mut self, vector_store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(vector_store);
        self
    }

    pub async fn execute(&self, key: &SnapshotKey) -> Result<(), DomainError> {
        let index = self
            .snapshot_store
            .load_index(key)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("no project for {:?}", key)))?;

        info!("deleting project: {} ({})", index.name, index.root);

        if let Some(ref vector_store) = self.vector_store {
            vector_store.clear().await?;
        }
        self.snapshot_store.delete(key).await?;

        info!("project deleted");
        Ok(())
    }
}

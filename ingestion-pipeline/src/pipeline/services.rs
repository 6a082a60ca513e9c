use async_trait::async_trait;
use common::error::AppError;
use retrieval_pipeline::{IndexManager, IndexStats};

/// The index operation the ingest pipeline depends on.
#[async_trait]
pub trait IndexRefresh: Send + Sync {
    async fn rebuild(&self) -> Result<IndexStats, AppError>;
}

#[async_trait]
impl IndexRefresh for IndexManager {
    async fn rebuild(&self) -> Result<IndexStats, AppError> {
        IndexManager::rebuild(self).await
    }
}

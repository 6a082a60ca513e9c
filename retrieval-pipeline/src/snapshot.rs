use bytes::Bytes;
use common::{error::AppError, storage::store::StorageManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::index::DocumentIndex;

pub const SNAPSHOT_FILE: &str = "snapshot.json";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    index: &'a DocumentIndex,
}

#[derive(Deserialize)]
struct SnapshotOwned {
    version: u32,
    index: DocumentIndex,
}

/// Reads and writes the persisted index inside the index directory.
#[derive(Clone)]
pub struct SnapshotStore {
    storage: StorageManager,
    location: String,
}

impl SnapshotStore {
    pub fn new(storage: StorageManager, index_dir: &str) -> Self {
        let dir = index_dir.trim_matches('/');
        let location = if dir.is_empty() {
            SNAPSHOT_FILE.to_string()
        } else {
            format!("{dir}/{SNAPSHOT_FILE}")
        };
        Self { storage, location }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub async fn exists(&self) -> Result<bool, AppError> {
        Ok(self.storage.exists(&self.location).await?)
    }

    /// Loads the snapshot, or `None` when none has been written yet.
    pub async fn load(&self) -> Result<Option<DocumentIndex>, AppError> {
        if !self.exists().await? {
            return Ok(None);
        }

        let bytes = self.storage.get(&self.location).await?;
        let snapshot: SnapshotOwned = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_FORMAT_VERSION {
            return Err(AppError::Index(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_FORMAT_VERSION})",
                snapshot.version
            )));
        }

        debug!(
            location = %self.location,
            documents = snapshot.index.document_count(),
            chunks = snapshot.index.chunk_count(),
            "Loaded index snapshot"
        );
        Ok(Some(snapshot.index))
    }

    /// Replaces the persisted snapshot with `index`.
    pub async fn save(&self, index: &DocumentIndex) -> Result<(), AppError> {
        let payload = serde_json::to_vec(&SnapshotRef {
            version: SNAPSHOT_FORMAT_VERSION,
            index,
        })?;
        let size = payload.len();
        self.storage
            .put(&self.location, Bytes::from(payload))
            .await
            .map_err(|e| AppError::Index(format!("failed to persist index snapshot: {e}")))?;

        info!(
            location = %self.location,
            bytes = size,
            documents = index.document_count(),
            chunks = index.chunk_count(),
            "Persisted index snapshot"
        );
        Ok(())
    }
}

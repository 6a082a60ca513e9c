use std::{collections::HashMap, sync::Arc};

use common::{
    error::AppError,
    storage::{store::StorageManager, types::stored_document::document_location},
    utils::config::AppConfig,
};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tracing::{info, instrument, warn};

use crate::filter::UploadedFile;

/// A successfully persisted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenDocument {
    pub file_name: String,
    pub location: String,
    pub bytes: u64,
}

/// Streams accepted uploads into the content directory.
pub struct DocumentWriter {
    storage: StorageManager,
    content_dir: String,
    chunk_size: usize,
    name_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentWriter {
    pub fn new(storage: StorageManager, content_dir: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            storage,
            content_dir: content_dir.into(),
            chunk_size: chunk_size.max(1),
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(storage: StorageManager, config: &AppConfig) -> Self {
        Self::new(storage, config.content_dir.clone(), config.upload_chunk_bytes)
    }

    /// Writes one upload, replacing any document with the same name.
    #[instrument(skip_all, fields(file_name = %file.file_name))]
    pub async fn write(&self, file: &UploadedFile) -> Result<WrittenDocument, AppError> {
        let lock = self.lock_for(&file.file_name).await;
        let result = {
            let _guard = lock.lock().await;
            self.stream_to_storage(file).await
        };
        drop(lock);
        self.release_idle_locks().await;

        match &result {
            Ok(written) => info!(bytes = written.bytes, location = %written.location, "Stored document"),
            Err(err) => warn!(error = %err, "Failed to store document"),
        }
        result
    }

    /// Writes every upload concurrently and reports each outcome in input order.
    pub async fn write_all(&self, files: &[UploadedFile]) -> Vec<Result<WrittenDocument, AppError>> {
        join_all(files.iter().map(|file| self.write(file))).await
    }

    async fn stream_to_storage(&self, file: &UploadedFile) -> Result<WrittenDocument, AppError> {
        let location = document_location(&self.content_dir, &file.file_name);
        let source = tokio::fs::File::open(file.contents.path())
            .await
            .map_err(|e| AppError::file_processing(&file.file_name, e))?;
        let chunks = ReaderStream::with_capacity(source, self.chunk_size);

        let bytes = self
            .storage
            .put_chunked(&location, self.chunk_size, chunks)
            .await
            .map_err(|e| AppError::file_processing(&file.file_name, e))?;

        Ok(WrittenDocument {
            file_name: file.file_name.clone(),
            location,
            bytes,
        })
    }

    async fn lock_for(&self, file_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.name_locks.lock().await;
        Arc::clone(
            locks
                .entry(file_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    async fn release_idle_locks(&self) {
        let mut locks = self.name_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

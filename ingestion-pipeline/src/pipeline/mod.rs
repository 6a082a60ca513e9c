mod services;

#[allow(clippy::module_name_repetitions)]
pub use services::IndexRefresh;

use std::sync::Arc;

use common::{error::AppError, storage::store::StorageManager, utils::config::AppConfig};
use retrieval_pipeline::IndexStats;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    filter::{FileFilter, UploadedFile},
    writer::DocumentWriter,
};

/// Result of one ingest request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub stored: Vec<String>,
    pub rejected: Vec<String>,
    /// Present when the request triggered a rebuild.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexStats>,
}

impl IngestOutcome {
    pub fn message(&self) -> String {
        let mut message = if self.stored.is_empty() {
            "No files were stored.".to_string()
        } else {
            format!("Successfully uploaded {}.", self.stored.join(", "))
        };
        if !self.rejected.is_empty() {
            message.push_str(&format!(
                " Rejected unsupported files: {}.",
                self.rejected.join(", ")
            ));
        }
        message
    }
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    filter: FileFilter,
    writer: DocumentWriter,
    index: Arc<dyn IndexRefresh>,
}

impl IngestionPipeline {
    pub fn new(config: &AppConfig, storage: StorageManager, index: Arc<dyn IndexRefresh>) -> Self {
        Self::with_parts(
            FileFilter::from_config(config),
            DocumentWriter::from_config(storage, config),
            index,
        )
    }

    pub fn with_parts(
        filter: FileFilter,
        writer: DocumentWriter,
        index: Arc<dyn IndexRefresh>,
    ) -> Self {
        Self {
            filter,
            writer,
            index,
        }
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// Validates, filters and stores the uploads, then rebuilds the index when
    /// at least one file was stored. A write failure is reported after the
    /// rebuild so the index still reflects what reached storage.
    #[instrument(skip_all, fields(uploads = files.len()))]
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestOutcome, AppError> {
        self.filter.validate_selection(&files)?;

        let filtered = self.filter.partition(files);
        if !filtered.rejected.is_empty() {
            info!(rejected = ?filtered.rejected, "Rejected uploads with unsupported extensions");
        }

        let mut stored = Vec::with_capacity(filtered.accepted.len());
        let mut first_failure = None;
        for result in self.writer.write_all(&filtered.accepted).await {
            match result {
                Ok(written) => stored.push(written.file_name),
                Err(err) => {
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        let index = if stored.is_empty() {
            None
        } else {
            Some(self.index.rebuild().await?)
        };

        if let Some(err) = first_failure {
            warn!(stored = stored.len(), error = %err, "Ingest finished with a failed file");
            return Err(err);
        }

        let outcome = IngestOutcome {
            stored,
            rejected: filtered.rejected,
            index,
        };
        info!(
            stored = outcome.stored.len(),
            rejected = outcome.rejected.len(),
            "Ingest complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::{store::StorageManager, types::stored_document::StoredDocument},
    utils::{config::AppConfig, embedding::EmbeddingProvider, file_types::has_accepted_extension},
};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{
    answer_retrieval::{Answer, AnswerSynthesizer},
    chunking::Chunker,
    index::{DocumentIndex, EmbeddingFingerprint, SourceDocument},
    snapshot::SnapshotStore,
    RetrievedChunk,
};

/// Where the published index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOrigin {
    /// Loaded from the persisted snapshot at startup.
    Snapshot,
    /// Built at startup because no snapshot existed.
    Fresh,
    /// Built from the content directory, replacing an earlier index or an unusable snapshot.
    Rebuilt,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub content_dir: String,
    pub index_dir: String,
    pub accepted_extensions: Vec<String>,
    pub embedding_batch_size: usize,
    pub top_k: usize,
}

impl IndexSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            content_dir: config.content_dir.clone(),
            index_dir: config.index_dir.clone(),
            accepted_extensions: config.accepted_extensions.clone(),
            embedding_batch_size: config.embedding_batch_size,
            top_k: config.retrieval_top_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub generation: u64,
    pub origin: IndexOrigin,
    pub document_count: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

/// Immutable query handle over one generation of the index.
pub struct QueryEngineView {
    index: Arc<DocumentIndex>,
    embedding: EmbeddingProvider,
    synthesizer: Arc<AnswerSynthesizer>,
    top_k: usize,
    generation: u64,
    origin: IndexOrigin,
}

impl QueryEngineView {
    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.generation,
            origin: self.origin,
            document_count: self.index.document_count(),
            chunk_count: self.index.chunk_count(),
            built_at: self.index.built_at,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, AppError> {
        let query_embedding = self
            .embedding
            .embed(query)
            .await
            .map_err(|e| AppError::Query(format!("failed to embed query: {e}")))?;
        Ok(self.index.search(&query_embedding, self.top_k))
    }

    pub async fn answer(&self, query: &str) -> Result<Answer, AppError> {
        let chunks = self.retrieve(query).await?;
        debug!(
            generation = self.generation,
            retrieved = chunks.len(),
            "Retrieved chunks for query"
        );
        self.synthesizer.synthesize(query, &chunks).await
    }
}

/// Owns the index: loads or builds it at startup, rebuilds it after ingests and
/// publishes a fresh `QueryEngineView` for each generation.
pub struct IndexManager {
    storage: StorageManager,
    embedding: EmbeddingProvider,
    synthesizer: Arc<AnswerSynthesizer>,
    chunker: Chunker,
    settings: IndexSettings,
    snapshots: SnapshotStore,
    rebuild_lock: Mutex<()>,
    view: RwLock<Arc<QueryEngineView>>,
}

impl IndexManager {
    /// Loads the persisted snapshot when it is usable, otherwise builds the index
    /// from the content directory and persists it.
    #[instrument(skip_all, fields(content_dir = %settings.content_dir))]
    pub async fn initialize(
        storage: StorageManager,
        embedding: EmbeddingProvider,
        synthesizer: AnswerSynthesizer,
        chunker: Chunker,
        settings: IndexSettings,
    ) -> Result<Self, AppError> {
        let snapshots = SnapshotStore::new(storage.clone(), &settings.index_dir);
        let fingerprint = EmbeddingFingerprint::of(&embedding);

        let loaded = match snapshots.load().await {
            Ok(Some(index)) if index.fingerprint == fingerprint => Some(index),
            Ok(Some(index)) => {
                warn!(
                    snapshot_backend = %index.fingerprint.backend,
                    snapshot_dimension = index.fingerprint.dimension,
                    backend = %fingerprint.backend,
                    dimension = fingerprint.dimension,
                    "Index snapshot was built with a different embedding configuration; rebuilding"
                );
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, location = %snapshots.location(), "Index snapshot is unreadable; rebuilding");
                None
            }
        };
        let snapshot_present = snapshots.exists().await?;

        let (index, origin) = match loaded {
            Some(index) => (index, IndexOrigin::Snapshot),
            None => {
                let index = build_index(&storage, &chunker, &embedding, &settings).await?;
                snapshots.save(&index).await?;
                let origin = if snapshot_present {
                    IndexOrigin::Rebuilt
                } else {
                    IndexOrigin::Fresh
                };
                (index, origin)
            }
        };

        let synthesizer = Arc::new(synthesizer);
        let view = QueryEngineView {
            index: Arc::new(index),
            embedding: embedding.clone(),
            synthesizer: Arc::clone(&synthesizer),
            top_k: settings.top_k,
            generation: 1,
            origin,
        };
        info!(
            origin = ?origin,
            answer_backend = synthesizer.label(),
            documents = view.index.document_count(),
            chunks = view.index.chunk_count(),
            "Index ready"
        );

        Ok(Self {
            storage,
            embedding,
            synthesizer,
            chunker,
            settings,
            snapshots,
            rebuild_lock: Mutex::new(()),
            view: RwLock::new(Arc::new(view)),
        })
    }

    /// Rescans the content directory, persists the new index and publishes it.
    /// On failure the previously published view stays in place.
    #[instrument(skip_all)]
    pub async fn rebuild(&self) -> Result<IndexStats, AppError> {
        let _guard = self.rebuild_lock.lock().await;

        let index =
            build_index(&self.storage, &self.chunker, &self.embedding, &self.settings).await?;
        self.snapshots.save(&index).await.map_err(|e| match e {
            AppError::Index(_) => e,
            other => AppError::Index(format!("failed to persist index snapshot: {other}")),
        })?;

        let generation = self.view.read().await.generation.saturating_add(1);
        let view = Arc::new(self.make_view(index, generation, IndexOrigin::Rebuilt));
        let stats = view.stats();
        *self.view.write().await = view;

        info!(
            generation = stats.generation,
            documents = stats.document_count,
            chunks = stats.chunk_count,
            "Published rebuilt index"
        );
        Ok(stats)
    }

    /// The currently published view. Callers keep the `Arc` for the whole request.
    pub async fn current_view(&self) -> Arc<QueryEngineView> {
        Arc::clone(&*self.view.read().await)
    }

    pub async fn stats(&self) -> IndexStats {
        self.current_view().await.stats()
    }

    fn make_view(&self, index: DocumentIndex, generation: u64, origin: IndexOrigin) -> QueryEngineView {
        QueryEngineView {
            index: Arc::new(index),
            embedding: self.embedding.clone(),
            synthesizer: Arc::clone(&self.synthesizer),
            top_k: self.settings.top_k,
            generation,
            origin,
        }
    }
}

/// Scans the content directory and indexes every document with an accepted extension.
async fn build_index(
    storage: &StorageManager,
    chunker: &Chunker,
    embedding: &EmbeddingProvider,
    settings: &IndexSettings,
) -> Result<DocumentIndex, AppError> {
    let stored = StoredDocument::list_all(storage, &settings.content_dir)
        .await
        .map_err(|e| AppError::Index(format!("failed to scan content directory: {e}")))?;

    let mut sources = Vec::with_capacity(stored.len());
    for document in stored {
        if !has_accepted_extension(&document.file_name, &settings.accepted_extensions) {
            debug!(file_name = %document.file_name, "Skipping document with unaccepted extension");
            continue;
        }
        let text = document.read_text(storage).await.map_err(|e| {
            AppError::Index(format!("failed to read `{}`: {e}", document.file_name))
        })?;
        sources.push(SourceDocument {
            file_name: document.file_name,
            size: document.size,
            text,
        });
    }

    DocumentIndex::build(sources, chunker, embedding, settings.embedding_batch_size).await
}

use chrono::{DateTime, Utc};
use common::{error::AppError, utils::embedding::EmbeddingProvider};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    chunking::Chunker,
    scoring::{by_score_desc, cosine_similarity},
    RetrievedChunk,
};

/// Identifies the embedding space an index was built in.
///
/// Vectors from different backends, models or dimensions are not comparable, so a
/// snapshot is only reusable when its fingerprint matches the running provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFingerprint {
    pub backend: String,
    pub model: Option<String>,
    pub dimension: usize,
}

impl EmbeddingFingerprint {
    pub fn of(provider: &EmbeddingProvider) -> Self {
        Self {
            backend: provider.backend_label().to_string(),
            model: provider.model_code(),
            dimension: provider.dimension(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub file_name: String,
    pub ordinal: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub file_name: String,
    pub size: u64,
    pub chunk_count: usize,
}

/// Text of one stored document, ready to be chunked.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub size: u64,
    pub text: String,
}

/// Searchable representation of the corpus: every chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentIndex {
    pub fingerprint: EmbeddingFingerprint,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<IndexedDocument>,
    pub chunks: Vec<IndexedChunk>,
}

impl DocumentIndex {
    pub fn empty(fingerprint: EmbeddingFingerprint) -> Self {
        Self {
            fingerprint,
            built_at: Utc::now(),
            documents: Vec::new(),
            chunks: Vec::new(),
        }
    }

    /// Chunks and embeds every document. Embeddings are requested `batch_size` chunks at a time.
    pub async fn build(
        sources: Vec<SourceDocument>,
        chunker: &Chunker,
        embedding: &EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self, AppError> {
        let mut index = Self::empty(EmbeddingFingerprint::of(embedding));

        for source in sources {
            let texts = chunker.split(&source.text);
            let mut vectors = Vec::with_capacity(texts.len());

            for batch in texts.chunks(batch_size.max(1)) {
                let embedded = embedding.embed_batch(batch.to_vec()).await.map_err(|e| {
                    AppError::Index(format!("failed to embed `{}`: {e}", source.file_name))
                })?;
                if embedded.len() != batch.len() {
                    return Err(AppError::Index(format!(
                        "embedding backend returned {} vectors for {} chunks of `{}`",
                        embedded.len(),
                        batch.len(),
                        source.file_name
                    )));
                }
                vectors.extend(embedded);
            }

            debug!(
                file_name = %source.file_name,
                chunk_count = texts.len(),
                "Indexed document"
            );

            index.documents.push(IndexedDocument {
                file_name: source.file_name.clone(),
                size: source.size,
                chunk_count: texts.len(),
            });
            index.chunks.extend(texts.into_iter().zip(vectors).enumerate().map(
                |(ordinal, (text, embedding))| IndexedChunk {
                    id: Uuid::new_v4().to_string(),
                    file_name: source.file_name.clone(),
                    ordinal,
                    text,
                    embedding,
                },
            ));
        }

        Ok(index)
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn contains_document(&self, file_name: &str) -> bool {
        self.documents.iter().any(|d| d.file_name == file_name)
    }

    /// Brute-force cosine search. Chunks with no similarity at all are never returned.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .map(|chunk| RetrievedChunk {
                score: cosine_similarity(query_embedding, &chunk.embedding),
                chunk: chunk.clone(),
            })
            .filter(|retrieved| retrieved.score > 0.0)
            .collect();

        scored.sort_by(|a, b| by_score_desc(a.score, b.score));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(file_name: &str, text: &str) -> SourceDocument {
        SourceDocument {
            file_name: file_name.into(),
            size: text.len() as u64,
            text: text.into(),
        }
    }

    async fn build_index(sources: Vec<SourceDocument>) -> DocumentIndex {
        let chunker = Chunker::new(20, 200, 0).expect("chunker");
        let embedding = EmbeddingProvider::new_hashed(256).expect("hashed provider");
        DocumentIndex::build(sources, &chunker, &embedding, 2)
            .await
            .expect("build index")
    }

    #[tokio::test]
    async fn build_records_documents_and_chunks() {
        let index = build_index(vec![
            source("ferries.txt", "The harbour ferry leaves at dawn."),
            source("empty.txt", "   "),
        ])
        .await;

        assert_eq!(index.document_count(), 2);
        assert_eq!(index.chunk_count(), 1);
        assert!(index.contains_document("empty.txt"));
        assert_eq!(index.documents[1].chunk_count, 0);
        assert_eq!(index.fingerprint.backend, "hashed");
        assert_eq!(index.fingerprint.dimension, 256);
    }

    #[tokio::test]
    async fn search_ranks_matching_document_first() {
        let embedding = EmbeddingProvider::new_hashed(256).expect("hashed provider");
        let index = build_index(vec![
            source("ferries.txt", "The harbour ferry leaves at dawn every morning."),
            source("volcano.txt", "Basalt columns formed from cooling lava flows."),
        ])
        .await;

        let query = embedding.embed("when does the ferry leave").await.expect("embed");
        let results = index.search(&query, 1);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.file_name, "ferries.txt");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn search_on_empty_index_returns_nothing() {
        let embedding = EmbeddingProvider::new_hashed(64).expect("hashed provider");
        let index = DocumentIndex::empty(EmbeddingFingerprint::of(&embedding));
        let query = embedding.embed("anything").await.expect("embed");

        assert!(index.search(&query, 3).is_empty());
    }

    #[tokio::test]
    async fn chunk_ordinals_restart_per_document() {
        let chunker = Chunker::new(10, 30, 0).expect("chunker");
        let embedding = EmbeddingProvider::new_hashed(32).expect("hashed provider");
        let index = DocumentIndex::build(
            vec![
                source("a.txt", "alpha words here. more alpha words here. even more."),
                source("b.txt", "beta"),
            ],
            &chunker,
            &embedding,
            1,
        )
        .await
        .expect("build");

        let b_chunks: Vec<&IndexedChunk> =
            index.chunks.iter().filter(|c| c.file_name == "b.txt").collect();
        assert_eq!(b_chunks.len(), 1);
        assert_eq!(b_chunks[0].ordinal, 0);
        assert!(index.chunks.iter().filter(|c| c.file_name == "a.txt").count() > 1);
    }
}

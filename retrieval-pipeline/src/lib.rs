pub mod answer_retrieval;
pub mod chunking;
pub mod index;
pub mod manager;
pub mod query;
pub mod scoring;
pub mod snapshot;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::store::StorageManager,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};

pub use answer_retrieval::{Answer, AnswerSynthesizer, EMPTY_RESPONSE};
pub use chunking::Chunker;
pub use index::{DocumentIndex, IndexedChunk};
pub use manager::{IndexManager, IndexOrigin, IndexSettings, IndexStats, QueryEngineView};
pub use query::{AnswerSource, QueryResponse, QueryService};

pub type OpenAIClientType = async_openai::Client<async_openai::config::OpenAIConfig>;

pub fn openai_client_from_config(config: &AppConfig) -> OpenAIClientType {
    OpenAIClientType::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    )
}

// A chunk matched by a query, with its cosine score in `0.0..=1.0`.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}

/// Wires the index manager from configuration. The OpenAI client is only
/// used by the backends that need it.
pub async fn index_manager_from_config(
    config: &AppConfig,
    storage: StorageManager,
    openai_client: Option<Arc<OpenAIClientType>>,
) -> Result<IndexManager, AppError> {
    let embedding = EmbeddingProvider::from_config(config, openai_client.clone()).await?;
    let synthesizer = AnswerSynthesizer::from_config(config, openai_client);
    let chunker = Chunker::from_config(config)?;

    IndexManager::initialize(
        storage,
        embedding,
        synthesizer,
        chunker,
        IndexSettings::from_config(config),
    )
    .await
}

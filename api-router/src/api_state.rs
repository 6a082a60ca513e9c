use std::sync::Arc;

use common::{
    create_template_engine,
    error::AppError,
    storage::store::StorageManager,
    utils::{
        config::AppConfig,
        template_engine::{ProvidesTemplateEngine, TemplateEngine},
    },
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{index_manager_from_config, IndexManager, OpenAIClientType, QueryService};
use tracing::debug;

#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub templates: Arc<TemplateEngine>,
    pub index: Arc<IndexManager>,
    pub ingestion: Arc<IngestionPipeline>,
    pub query: QueryService,
}

impl ApiState {
    /// Loads or builds the index and wires the ingest and query services around it.
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
        openai_client: Arc<OpenAIClientType>,
    ) -> Result<Self, AppError> {
        let index = Arc::new(
            index_manager_from_config(config, storage.clone(), Some(openai_client)).await?,
        );
        Ok(Self::with_index(config, storage, index))
    }

    pub fn with_index(config: &AppConfig, storage: StorageManager, index: Arc<IndexManager>) -> Self {
        let templates = Arc::new(create_template_engine!("templates"));
        debug!("Template engine configured for api_router.");

        Self {
            config: config.clone(),
            templates,
            ingestion: Arc::new(IngestionPipeline::new(config, storage, index.clone())),
            query: QueryService::new(index.clone()),
            index,
        }
    }
}

impl ProvidesTemplateEngine for ApiState {
    fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.templates
    }
}

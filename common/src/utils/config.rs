use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::embedding::EmbeddingBackend;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

/// How answers are produced from retrieved chunks.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerBackend {
    #[serde(alias = "llm")]
    OpenAI,
    Extractive,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

fn default_answer_backend() -> AnswerBackend {
    AnswerBackend::OpenAI
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
    #[serde(default = "default_accepted_extensions")]
    pub accepted_extensions: Vec<String>,
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
    #[serde(default = "default_ingest_max_files")]
    pub ingest_max_files: usize,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_answer_backend")]
    pub answer_backend: AnswerBackend,
    #[serde(default = "default_query_model")]
    pub query_model: String,
    #[serde(default = "default_query_system_prompt")]
    pub query_system_prompt: String,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_chunk_min_chars")]
    pub chunk_min_chars: usize,
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,
    #[serde(default = "default_chunk_overlap_chars")]
    pub chunk_overlap_chars: usize,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_http_port() -> u16 {
    8000
}

fn default_content_dir() -> String {
    "documents".to_string()
}

fn default_index_dir() -> String {
    "index".to_string()
}

fn default_accepted_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

const fn default_upload_chunk_bytes() -> usize {
    1024 * 1024
}

const fn default_ingest_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

const fn default_ingest_max_files() -> usize {
    100
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

const fn default_embedding_dimensions() -> u32 {
    1536
}

const fn default_embedding_batch_size() -> usize {
    64
}

fn default_query_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_query_system_prompt() -> String {
    "You answer questions using only the provided context information. \
     If the context does not contain the answer, say that you do not know."
        .to_string()
}

const fn default_retrieval_top_k() -> usize {
    2
}

const fn default_chunk_min_chars() -> usize {
    256
}

const fn default_chunk_max_chars() -> usize {
    1024
}

const fn default_chunk_overlap_chars() -> usize {
    64
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            content_dir: default_content_dir(),
            index_dir: default_index_dir(),
            accepted_extensions: default_accepted_extensions(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
            ingest_max_files: default_ingest_max_files(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            embedding_batch_size: default_embedding_batch_size(),
            answer_backend: default_answer_backend(),
            query_model: default_query_model(),
            query_system_prompt: default_query_system_prompt(),
            retrieval_top_k: default_retrieval_top_k(),
            chunk_min_chars: default_chunk_min_chars(),
            chunk_max_chars: default_chunk_max_chars(),
            chunk_overlap_chars: default_chunk_overlap_chars(),
        }
    }
}

impl AppConfig {
    /// Rejects configurations the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "openai_api_key is required (set OPENAI_API_KEY or add it to the config file)"
                    .into(),
            ));
        }
        if self.accepted_extensions.is_empty() {
            return Err(ConfigError::Message(
                "accepted_extensions must list at least one extension".into(),
            ));
        }
        if self.upload_chunk_bytes == 0 {
            return Err(ConfigError::Message(
                "upload_chunk_bytes must be greater than zero".into(),
            ));
        }
        if self.chunk_min_chars == 0 || self.chunk_min_chars > self.chunk_max_chars {
            return Err(ConfigError::Message(format!(
                "chunk bounds are invalid: min {} / max {}",
                self.chunk_min_chars, self.chunk_max_chars
            )));
        }
        if self.chunk_overlap_chars >= self.chunk_min_chars {
            return Err(ConfigError::Message(format!(
                "chunk_overlap_chars ({}) must be smaller than chunk_min_chars ({})",
                self.chunk_overlap_chars, self.chunk_min_chars
            )));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("accepted_extensions"),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;
    app_config.validate()?;

    Ok(app_config)
}

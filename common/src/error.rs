use async_openai::error::OpenAIError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("failed to process file `{file_name}`: {message}")]
    FileProcessing { file_name: String, message: String },
    #[error("failed to process query: {0}")]
    Query(String),
    #[error("Index error: {0}")]
    Index(String),
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Wraps any failure while persisting an upload so the file name travels with it.
    pub fn file_processing(file_name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::FileProcessing {
            file_name: file_name.into(),
            message: cause.to_string(),
        }
    }
}

use std::sync::Arc;

use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use common::{
    error::AppError,
    utils::config::{AnswerBackend, AppConfig},
};
use serde_json::Value;
use tracing::debug;

use crate::{OpenAIClientType, RetrievedChunk};

/// Rendered when retrieval finds nothing to answer from.
pub const EMPTY_RESPONSE: &str = "Empty Response";

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub content: String,
}

impl Answer {
    pub fn empty() -> Self {
        Self {
            content: EMPTY_RESPONSE.to_string(),
        }
    }

    /// Display form returned to clients.
    pub fn render(&self) -> String {
        self.content.trim().to_string()
    }
}

/// Turns retrieved chunks into an answer.
pub enum AnswerSynthesizer {
    OpenAI {
        client: Arc<OpenAIClientType>,
        model: String,
        system_prompt: String,
    },
    Extractive,
}

impl AnswerSynthesizer {
    pub fn from_config(config: &AppConfig, client: Option<Arc<OpenAIClientType>>) -> Self {
        match (config.answer_backend, client) {
            (AnswerBackend::OpenAI, Some(client)) => Self::OpenAI {
                client,
                model: config.query_model.clone(),
                system_prompt: config.query_system_prompt.clone(),
            },
            _ => Self::Extractive,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAI { .. } => "openai",
            Self::Extractive => "extractive",
        }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError> {
        if chunks.is_empty() {
            return Ok(Answer::empty());
        }

        match self {
            Self::Extractive => Ok(Answer {
                content: render_passages(chunks),
            }),
            Self::OpenAI {
                client,
                model,
                system_prompt,
            } => {
                let context = chunks_to_chat_context(chunks);
                let user_message = create_user_message(&context, query);
                let request = create_chat_request(user_message, model, system_prompt)?;
                let response = client.chat().create(request).await?;
                let content = process_llm_response(response)?;
                debug!(model = %model, chunks = chunks.len(), "Synthesized answer");

                Ok(Answer { content })
            }
        }
    }
}

fn render_passages(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|retrieved| format!("[{}] {}", retrieved.chunk.file_name, retrieved.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn create_user_message(context_json: &Value, query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context_json}

        User Question:
        ==================
        {query}
        "
    )
}

/// Convert chunk-based retrieval results to JSON format for LLM context
pub fn chunks_to_chat_context(chunks: &[RetrievedChunk]) -> Value {
    fn round_score(value: f32) -> f64 {
        (f64::from(value) * 1000.0).round() / 1000.0
    }

    serde_json::json!(chunks
        .iter()
        .map(|chunk| {
            serde_json::json!({
                "source": chunk.chunk.file_name,
                "content": chunk.chunk.text,
                "score": round_score(chunk.score),
            })
        })
        .collect::<Vec<_>>())
}

pub fn create_chat_request(
    user_message: String,
    model: &str,
    system_prompt: &str,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(system_prompt.to_string()).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .build()
}

pub fn process_llm_response(response: CreateChatCompletionResponse) -> Result<String, AppError> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AppError::Query("No content found in LLM response".into()))
}

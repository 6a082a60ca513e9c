use std::sync::Arc;

use async_trait::async_trait;
use common::error::AppError;
use serde::Serialize;
use tracing::{error, instrument};

use crate::{answer_retrieval::Answer, manager::IndexManager};

/// Anything that can answer a query against the current index.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn answer(&self, query: &str) -> Result<Answer, AppError>;
}

#[async_trait]
impl AnswerSource for IndexManager {
    async fn answer(&self, query: &str) -> Result<Answer, AppError> {
        // One view per query, even if a rebuild publishes a new one meanwhile.
        let view = self.current_view().await;
        view.answer(query).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: String,
}

#[derive(Clone)]
pub struct QueryService {
    source: Arc<dyn AnswerSource>,
}

impl QueryService {
    pub fn new(source: Arc<dyn AnswerSource>) -> Self {
        Self { source }
    }

    #[instrument(skip(self))]
    pub async fn query(&self, query: &str) -> Result<QueryResponse, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("query must not be empty".into()));
        }

        let answer = self.source.answer(query).await.map_err(|err| {
            error!(error = %err, "Query failed");
            match err {
                AppError::Query(_) => err,
                other => AppError::Query(other.to_string()),
            }
        })?;

        Ok(QueryResponse {
            query: query.to_string(),
            results: answer.render(),
        })
    }
}

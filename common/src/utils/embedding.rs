use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, ensure, Context, Result};
use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use fastembed::{EmbeddingModel, ModelTrait, TextEmbedding, TextInitOptions};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::config::AppConfig;

/// Identifies how hashed vectors are bucketed; changes whenever the bucketing does.
const HASHED_SCHEME: &str = "sha256-buckets-v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAI,
    #[serde(alias = "fast-embed", alias = "fast")]
    FastEmbed,
    /// Offline token hashing, for tests and air-gapped runs.
    Hashed,
}

/// Turns document chunks and queries into vectors of a fixed dimension.
#[derive(Clone)]
pub struct EmbeddingProvider {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    FastEmbed {
        model: Arc<Mutex<TextEmbedding>>,
        model_name: EmbeddingModel,
        dimension: usize,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub async fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<OpenAIConfig>>>,
    ) -> Result<Self> {
        match config.embedding_backend {
            EmbeddingBackend::OpenAI => {
                let client = openai_client
                    .ok_or_else(|| anyhow!("the openai embedding backend needs an OpenAI client"))?;
                Ok(Self::new_openai(
                    client,
                    config.embedding_model.clone(),
                    config.embedding_dimensions,
                ))
            }
            EmbeddingBackend::FastEmbed => {
                // `embedding_model` usually names an OpenAI model; only a FastEmbed code overrides the default.
                let model_name = EmbeddingModel::from_str(&config.embedding_model).ok();
                Self::new_fastembed(model_name).await
            }
            EmbeddingBackend::Hashed => Self::new_hashed(config.embedding_dimensions as usize),
        }
    }

    pub fn new_openai(client: Arc<Client<OpenAIConfig>>, model: String, dimensions: u32) -> Self {
        Self {
            backend: Backend::OpenAI {
                client,
                model,
                dimensions,
            },
        }
    }

    pub async fn new_fastembed(model_name: Option<EmbeddingModel>) -> Result<Self> {
        let model_name = model_name.unwrap_or_default();
        let options = TextInitOptions::new(model_name.clone()).with_show_download_progress(true);
        let info_name = model_name.clone();

        // Model loading reads weights from disk and may download them.
        let (model, dimension) = tokio::task::spawn_blocking(move || -> Result<_> {
            let model = TextEmbedding::try_new(options).context("loading FastEmbed model")?;
            let dimension = EmbeddingModel::get_model_info(&info_name)
                .map(|info| info.dim)
                .ok_or_else(|| anyhow!("no FastEmbed metadata for {info_name}"))?;
            Ok((model, dimension))
        })
        .await
        .context("FastEmbed loader task")??;

        Ok(Self {
            backend: Backend::FastEmbed {
                model: Arc::new(Mutex::new(model)),
                model_name,
                dimension,
            },
        })
    }

    pub fn new_hashed(dimension: usize) -> Result<Self> {
        ensure!(dimension > 0, "hashed embeddings need a positive dimension");
        Ok(Self {
            backend: Backend::Hashed { dimension },
        })
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            Backend::OpenAI { .. } => "openai",
            Backend::FastEmbed { .. } => "fastembed",
            Backend::Hashed { .. } => "hashed",
        }
    }

    /// Model identity recorded with persisted vectors.
    pub fn model_code(&self) -> Option<String> {
        match &self.backend {
            Backend::OpenAI { model, .. } => Some(model.clone()),
            Backend::FastEmbed { model_name, .. } => Some(model_name.to_string()),
            Backend::Hashed { .. } => Some(HASHED_SCHEME.to_string()),
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.backend {
            Backend::OpenAI { dimensions, .. } => *dimensions as usize,
            Backend::FastEmbed { dimension, .. } | Backend::Hashed { dimension } => *dimension,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_owned()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("{} returned no embedding", self.backend_label()))
    }

    /// Embeds `texts` in one backend call, returning vectors in input order.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();

        let vectors: Vec<Vec<f32>> = match &self.backend {
            Backend::Hashed { dimension } => texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect(),
            Backend::FastEmbed { model, .. } => model
                .lock()
                .await
                .embed(texts, None)
                .context("FastEmbed batch")?,
            Backend::OpenAI {
                client,
                model,
                dimensions,
            } => {
                let request = CreateEmbeddingRequestArgs::default()
                    .model(model.clone())
                    .input(texts)
                    .dimensions(*dimensions)
                    .build()?;
                let mut data = client.embeddings().create(request).await?.data;
                data.sort_by_key(|item| item.index);
                data.into_iter().map(|item| item.embedding).collect()
            }
        };

        ensure!(
            vectors.len() == expected,
            "{} returned {} embeddings for {expected} inputs",
            self.backend_label(),
            vectors.len()
        );
        debug!(backend = self.backend_label(), count = expected, "Embedded batch");
        Ok(vectors)
    }
}

/// Bag-of-words vector: each lowercase alphanumeric token adds one to a
/// SHA-256-selected bucket, then the vector is L2-normalized.
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimension];
    let tokens = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty());
    for token in tokens {
        if let Some(slot) = vector.get_mut(bucket(&token.to_lowercase(), dimension)) {
            *slot += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

fn bucket(token: &str, dimension: usize) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(prefix) % dimension as u64) as usize
}

use crate::embeddings::types;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";
const OPENAI_DEFAULT_DIM: usize = 1536;

pub struct OpenAiEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: Option<&str>,
        dimensions: Option<usize>,
    ) -> Self {
        let model = model.unwrap_or(OPENAI_DEFAULT_MODEL);
        let dimensions = dimensions.unwrap_or(OPENAI_DEFAULT_DIM);
        info!(
            "OpenAI embedding service initialized (model: {}, dim: {})",
            model, dimensions
        );
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimensions
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embedding API error: {} {}", status, body);
        }

        let data: EmbeddingResponse = resp.json().await?;
        data.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("OpenAI embedding API returned no data")
    }
}

#[async_trait]
impl types::EmbeddingService for OpenAiEmbedding {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn embed_passage(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }
}

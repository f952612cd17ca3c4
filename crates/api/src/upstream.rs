use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;

/// Ollama `/api/embeddings` client.
#[derive(Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OllamaRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .context("Failed to send embedding request")?;

        if !response.status().is_success() {
            anyhow::bail!("Embedding request failed: {}", response.status());
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if parsed.embedding.is_empty() {
            anyhow::bail!("Upstream returned an empty embedding");
        }
        Ok(parsed.embedding)
    }
}

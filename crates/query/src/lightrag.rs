use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::backend::{QueryBackend, QueryMode, QueryParams};
use crate::error::QueryError;

/// Suffix LightRAG appends to its canned reply when retrieval found nothing.
const NO_CONTEXT_MARKER: &str = "[no-context]";

/// Client for a running LightRAG server.
#[derive(Clone)]
pub struct LightRagClient {
    base_url: String,
    api_key: Option<String>,
    name: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    mode: QueryMode,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    response: Option<String>,
}

#[derive(Serialize)]
struct ClearCacheRequest<'a> {
    modes: &'a [String],
}

#[derive(Serialize)]
struct InsertTextRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_source: Option<&'a str>,
}

impl LightRagClient {
    /// `working_dir` is the server's storage directory; its base name
    /// identifies this backend in archived answers.
    pub fn new(base_url: String, api_key: Option<String>, working_dir: &Path) -> Self {
        let name = working_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "lightrag".to_string());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            name,
            client: reqwest::Client::new(),
        }
    }

    fn supports(mode: QueryMode) -> bool {
        matches!(
            mode,
            QueryMode::Naive
                | QueryMode::Local
                | QueryMode::Global
                | QueryMode::Hybrid
                | QueryMode::Mix
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    async fn send<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response, QueryError> {
        let response = self
            .post(path)
            .json(body)
            .send()
            .await
            .map_err(|source| QueryError::Http {
                backend: self.name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                backend: self.name.clone(),
                status,
                body,
            });
        }

        Ok(response)
    }

    /// Insert a document into the server's index.
    pub async fn insert_text(&self, text: &str, source: Option<&str>) -> anyhow::Result<()> {
        let request = InsertTextRequest {
            text,
            file_source: source,
        };
        self.send("/documents/text", &request)
            .await
            .context("Failed to insert document into LightRAG")?;
        Ok(())
    }

    /// Drop the server's cached LLM responses for `modes`, both in memory and
    /// in its persisted store.
    pub async fn clear_cache(&self, modes: &[String]) -> anyhow::Result<()> {
        self.send("/documents/clear_cache", &ClearCacheRequest { modes })
            .await
            .context("Failed to clear LightRAG response cache")?;
        info!(backend = %self.name, modes = %modes.join(","), "Cleared server response cache");
        Ok(())
    }
}

#[async_trait]
impl QueryBackend for LightRagClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(
        &self,
        question: &str,
        params: &QueryParams,
    ) -> Result<Option<String>, QueryError> {
        if !Self::supports(params.mode) {
            return Err(QueryError::UnsupportedMode {
                backend: self.name.clone(),
                mode: params.mode,
            });
        }

        let request = QueryRequest {
            query: question,
            mode: params.mode,
            top_k: params.top_k,
        };

        let response = self.send("/query", &request).await?;
        let body: QueryResponse = response.json().await.map_err(|source| QueryError::Http {
            backend: self.name.clone(),
            source,
        })?;

        let answer = body
            .response
            .filter(|text| !text.trim().is_empty() && !text.contains(NO_CONTEXT_MARKER));

        if answer.is_none() {
            debug!(backend = %self.name, "LightRAG returned no answer");
        }

        Ok(answer)
    }
}

mod cache;
mod config;
mod upstream;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cache::EmbeddingCache;
use config::ServerConfig;
use upstream::OllamaEmbedder;

struct AppState {
    embedder: OllamaEmbedder,
    cache: EmbeddingCache,
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Deserialize)]
struct EmbeddingRequest {
    #[serde(default)]
    model: Option<String>,
    input: EmbeddingInput,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

impl EmbeddingInput {
    fn into_texts(self) -> Vec<String> {
        match self {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingResponse {
    object: &'static str,
    model: String,
    data: Vec<EmbeddingData>,
}

#[derive(Serialize)]
struct EmbeddingData {
    object: &'static str,
    embedding: Vec<f32>,
    index: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let state = Arc::new(AppState {
        embedder: OllamaEmbedder::new(&config.upstream),
        cache: EmbeddingCache::new(if config.cache.enabled {
            config.cache.max_entries
        } else {
            0
        }),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!(
        addr = %config.bind_addr,
        upstream = %config.upstream.base_url,
        model = %config.upstream.model,
        "Embedding server listening"
    );

    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/embeddings", post(create_embeddings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn create_embeddings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmbeddingRequest>,
) -> Result<Json<EmbeddingResponse>, (StatusCode, String)> {
    let texts = req.input.into_texts();
    let mut data = Vec::with_capacity(texts.len());

    for (index, text) in texts.iter().enumerate() {
        let embedding = match state.cache.get(text) {
            Some(cached) => cached,
            None => {
                let embedding = state.embedder.embed(text).await.map_err(|e| {
                    tracing::error!(error = %e, "Upstream embedding failed");
                    (StatusCode::BAD_GATEWAY, format!("Embedding failed: {:#}", e))
                })?;
                state.cache.insert(text, embedding.clone());
                embedding
            }
        };
        data.push(EmbeddingData {
            object: "embedding",
            embedding,
            index,
        });
    }

    tracing::debug!(inputs = data.len(), cached = state.cache.len(), "Served embeddings");

    Ok(Json(EmbeddingResponse {
        object: "list",
        model: req.model.unwrap_or_default(),
        data,
    }))
}

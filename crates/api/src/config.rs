use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
}

/// Ollama instance that computes the embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:54321".to_string(),
            upstream: UpstreamConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "all-minilm".to_string(),
            },
            cache: CacheConfig {
                enabled: true,
                max_entries: 10000,
            },
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let max_entries = match get("EMBED_CACHE_ENTRIES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                anyhow::anyhow!("Invalid value for EMBED_CACHE_ENTRIES: {:?} ({})", raw, e)
            })?,
            None => defaults.cache.max_entries,
        };

        Ok(Self {
            bind_addr: get("EMBED_SERVER_ADDR").unwrap_or(defaults.bind_addr),
            upstream: UpstreamConfig {
                base_url: get("OLLAMA_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.upstream.base_url),
                model: get("EMBED_UPSTREAM_MODEL").unwrap_or(defaults.upstream.model),
            },
            cache: CacheConfig {
                enabled: max_entries > 0,
                max_entries,
            },
        })
    }
}

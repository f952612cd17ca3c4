use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// File name of LightRAG's persisted LLM response cache inside its working dir.
pub const LLM_RESPONSE_CACHE_FILE: &str = "kv_store_llm_response_cache.json";

/// A persisted key-value response cache, loaded as an untyped JSON tree.
pub struct ResponseCache {
    path: PathBuf,
    data: Value,
}

impl ResponseCache {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read response cache: {}", path.display()))?;

        let data: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse response cache: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Null out every `field` key at any depth. Returns how many keys were reset.
    pub fn reset_field(&mut self, field: &str) -> usize {
        reset_field_in(&mut self.data, field)
    }

    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write response cache: {}", self.path.display()))
    }
}

/// Visit the tree, resetting `field` in every object and recursing into all
/// object values and array elements whether or not a reset happened.
fn reset_field_in(node: &mut Value, field: &str) -> usize {
    match node {
        Value::Object(map) => {
            let mut resets = 0;
            if let Some(value) = map.get_mut(field) {
                *value = Value::Null;
                resets += 1;
            }
            for value in map.values_mut() {
                resets += reset_field_in(value, field);
            }
            resets
        }
        Value::Array(items) => items
            .iter_mut()
            .map(|item| reset_field_in(item, field))
            .sum(),
        _ => 0,
    }
}

/// Load the cache once, clear each mode field, and rewrite it.
pub async fn clear_mode_fields(path: &Path, fields: &[String]) -> Result<usize> {
    let mut cache = ResponseCache::load(path).await?;

    let mut total = 0;
    for field in fields {
        let resets = cache.reset_field(field);
        info!(field = %field, resets, path = %path.display(), "Cleared cached responses");
        total += resets;
    }

    cache.save().await?;
    Ok(total)
}

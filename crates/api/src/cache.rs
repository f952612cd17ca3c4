use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Embeddings keyed by the SHA-256 of their input text.
#[derive(Clone)]
pub struct EmbeddingCache {
    embeddings: Arc<DashMap<String, Vec<f32>>>,
    max_entries: usize,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            embeddings: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn insert(&self, text: &str, embedding: Vec<f32>) {
        if self.max_entries == 0 {
            return;
        }
        if self.embeddings.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .embeddings
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.embeddings.remove(&key);
            }
        }
        self.embeddings.insert(hash_text(text), embedding);
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.embeddings
            .get(&hash_text(text))
            .map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = EmbeddingCache::new(10);
        cache.insert("hello", vec![0.1, 0.2]);
        assert_eq!(cache.get("hello"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("hello "), None);
    }

    #[test]
    fn test_bounded() {
        let cache = EmbeddingCache::new(4);
        for i in 0..20 {
            cache.insert(&format!("text {i}"), vec![i as f32]);
        }
        assert!(cache.len() <= 4);
        assert_eq!(cache.get("text 19"), Some(vec![19.0]));
    }

    #[test]
    fn test_disabled() {
        let cache = EmbeddingCache::new(0);
        cache.insert("hello", vec![1.0]);
        assert_eq!(cache.get("hello"), None);
    }
}

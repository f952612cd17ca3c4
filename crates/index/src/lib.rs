pub mod embeddings;
pub mod reader;
pub mod response_cache;

pub use embeddings::EmbeddingClient;
pub use reader::DocumentReader;
pub use response_cache::{LLM_RESPONSE_CACHE_FILE, ResponseCache, clear_mode_fields};

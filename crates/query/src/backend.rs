use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Retrieval strategy a backend uses to pick context before answering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Naive,
    Local,
    Global,
    Hybrid,
    Mix,
    Drift,
    Basic,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Naive => "naive",
            QueryMode::Local => "local",
            QueryMode::Global => "global",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Mix => "mix",
            QueryMode::Drift => "drift",
            QueryMode::Basic => "basic",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(QueryMode::Naive),
            "local" => Ok(QueryMode::Local),
            "global" => Ok(QueryMode::Global),
            "hybrid" => Ok(QueryMode::Hybrid),
            "mix" => Ok(QueryMode::Mix),
            "drift" => Ok(QueryMode::Drift),
            "basic" => Ok(QueryMode::Basic),
            other => Err(format!("unknown query mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryParams {
    pub mode: QueryMode,
    pub top_k: usize,
}

/// A RAG system that can answer one question at a time.
///
/// `Ok(None)` means the backend ran but produced no answer; the caller may
/// retry that question in a later run.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Identifier used to tag archived answers.
    fn name(&self) -> &str;

    async fn query(&self, question: &str, params: &QueryParams)
    -> Result<Option<String>, QueryError>;
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use query::QueryMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// LightRAG storage directory; holds the response cache.
    pub working_dir: PathBuf,
    pub lightrag_url: String,
    pub lightrag_api_key: Option<String>,
    pub mode: QueryMode,
    pub top_k: usize,
    /// Mode fields reset in the response cache before a batch run.
    pub clear_cache_modes: Vec<String>,
    pub graphrag_bin: PathBuf,
    pub graphrag_root: PathBuf,
    pub graphrag_method: QueryMode,
    pub answers_dir: PathBuf,
    pub llm: EndpointConfig,
    pub embedding: EndpointConfig,
    pub logging: LoggingConfig,
}

/// An OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub file_name: String,
    pub rotation: LogRotation,
    /// Rotated files kept on disk.
    pub max_files: usize,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(LogRotation::Minutely),
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            other => Err(format!("unknown log rotation: {other}")),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            file_name: "ragbench.log".to_string(),
            rotation: LogRotation::Daily,
            max_files: 5,
            verbose: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let mode = parse_value::<QueryMode>("ANS_MODE", &or("ANS_MODE", "hybrid"))?;
        let graphrag_method =
            parse_value::<QueryMode>("GRAPHRAG_METHOD", &or("GRAPHRAG_METHOD", "drift"))?;
        let top_k = parse_value::<usize>("TOP_K", &or("TOP_K", "60"))?;
        let rotation = parse_value::<LogRotation>("LOG_ROTATION", &or("LOG_ROTATION", "daily"))?;
        let max_files = parse_value::<usize>("LOG_BACKUP_COUNT", &or("LOG_BACKUP_COUNT", "5"))?;
        let verbose = parse_value::<bool>(
            "VERBOSE_DEBUG",
            &or("VERBOSE_DEBUG", "false").to_ascii_lowercase(),
        )?;

        let log_dir = match get("LOG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };

        let clear_cache_modes = or("CLEAR_CACHE_MODES", "hybrid,local")
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();

        Ok(Self {
            working_dir: PathBuf::from(or("WORKING_DIR", "./rag_storage")),
            lightrag_url: or("LIGHTRAG_URL", "http://localhost:9621"),
            lightrag_api_key: get("LIGHTRAG_API_KEY"),
            mode,
            top_k,
            clear_cache_modes,
            graphrag_bin: PathBuf::from(or("GRAPHRAG_BIN", "graphrag")),
            graphrag_root: PathBuf::from(or("GRAPHRAG_ROOT", ".")),
            graphrag_method,
            answers_dir: PathBuf::from(or("ANS_DIR", "ans")),
            llm: EndpointConfig {
                base_url: or("OPENAI_API_BASE", "http://localhost:11434/v1"),
                api_key: get("OPENAI_API_KEY"),
                model: or("LLM_MODEL_NAME", "llama3"),
            },
            embedding: EndpointConfig {
                base_url: or("EMBED_URL", "http://localhost:54321/v1"),
                api_key: get("EMBED_TOKEN"),
                model: or("EMBED_MODEL", "sentence-transformers/all-MiniLM-L6-v2"),
            },
            logging: LoggingConfig {
                log_dir,
                file_name: or("LOG_FILE_NAME", "ragbench.log"),
                rotation,
                max_files,
                verbose,
            },
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {:?} ({})", key, raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[("LOG_DIR", "/tmp/logs")]).unwrap();
        assert_eq!(s.mode, QueryMode::Hybrid);
        assert_eq!(s.top_k, 60);
        assert_eq!(s.graphrag_method, QueryMode::Drift);
        assert_eq!(s.clear_cache_modes, vec!["hybrid", "local"]);
        assert_eq!(s.lightrag_api_key, None);
        assert_eq!(s.logging.log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(s.logging.rotation, LogRotation::Daily);
        assert_eq!(s.logging.file_name, "ragbench.log");
        assert!(!s.logging.verbose);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("ANS_MODE", "naive"),
            ("TOP_K", "5"),
            ("VERBOSE_DEBUG", "TRUE"),
            ("CLEAR_CACHE_MODES", "global, ,mix"),
            ("OPENAI_API_KEY", "sk-1"),
            ("LIGHTRAG_API_KEY", ""),
            ("LOG_FILE_NAME", "lightrag_run.log"),
        ])
        .unwrap();
        assert_eq!(s.mode, QueryMode::Naive);
        assert_eq!(s.top_k, 5);
        assert!(s.logging.verbose);
        assert_eq!(s.clear_cache_modes, vec!["global", "mix"]);
        assert_eq!(s.llm.api_key.as_deref(), Some("sk-1"));
        assert_eq!(s.lightrag_api_key, None);
        assert_eq!(s.logging.file_name, "lightrag_run.log");
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(settings(&[("TOP_K", "many")]).is_err());
        assert!(settings(&[("ANS_MODE", "semantic")]).is_err());
        assert!(settings(&[("LOG_ROTATION", "weekly")]).is_err());
    }
}

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_LLM_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Application configuration loaded from environment variables.
/// Start-up fails if the LLM API key is missing or a numeric value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    /// OpenAI-compatible embeddings endpoint. `None` selects the local hashing embedder.
    pub embedding_base_url: Option<String>,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub index_dir: PathBuf,
    /// CV indexed once at start-up, if set.
    pub cv_path: Option<PathBuf>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retriever_k: usize,
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_api_key = get("LLM_API_KEY")
            .or_else(|| get("GROQ_API_KEY"))
            .context("Required environment variable 'LLM_API_KEY' (or 'GROQ_API_KEY') is not set")?;

        let chunk_size = parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", 1000usize)?;
        let chunk_overlap = parse_or(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", 200usize)?;
        if chunk_size == 0 {
            bail!("CHUNK_SIZE must be greater than zero");
        }
        if chunk_overlap >= chunk_size {
            bail!("CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})");
        }
        let retriever_k = parse_or(get("RETRIEVER_K"), "RETRIEVER_K", 3usize)?;
        if retriever_k == 0 {
            bail!("RETRIEVER_K must be greater than zero");
        }

        Ok(Config {
            llm_api_key,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            embedding_base_url: get("EMBEDDING_BASE_URL"),
            embedding_model: get("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_api_key: get("EMBEDDING_API_KEY"),
            index_dir: get("INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("cv_faiss_index")),
            cv_path: get("CV_PATH").map(PathBuf::from),
            chunk_size,
            chunk_overlap,
            retriever_k,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 8000u16)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

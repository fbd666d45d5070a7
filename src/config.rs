//! TOML configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, which reproduce the stock behaviour (800-char segments
//! with 100 chars of overlap, 8 retrieved segments, diversity 0.3, Gemini
//! for both embeddings and generation).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    100
}

/// MMR retrieval settings for the LOCAL route.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Segments handed to the model.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Candidates ranked by plain similarity before MMR selection.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,
    /// Weight of the redundancy penalty: `0.0` is plain top-k, `1.0` is
    /// maximal variety.
    ///
    /// Note the direction: LangChain-style `lambda_mult` weights relevance
    /// instead, so `lambda_mult = 0.3` there corresponds to
    /// `diversity = 0.7` here. The default of `0.3` favours relevance; set
    /// `0.7` to reproduce a `lambda_mult = 0.3` retriever.
    #[serde(default = "default_diversity")]
    pub diversity: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            diversity: default_diversity(),
        }
    }
}

fn default_k() -> usize {
    8
}
fn default_fetch_k() -> usize {
    20
}
fn default_diversity() -> f32 {
    0.3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for self-hosted providers (Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            temperature: None,
            max_retries: 0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_llm_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory that `POST /sessions/{id}/document` may read from.
    /// Defaults to the server's working directory.
    #[serde(default)]
    pub documents_root: Option<PathBuf>,
    /// Browser origins allowed by CORS. Empty means no cross-origin access.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sessions unused for this long are dropped; `0` keeps them forever.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            documents_root: None,
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}
fn default_max_sessions() -> usize {
    64
}
fn default_session_idle_secs() -> u64 {
    3600
}

/// Optional replacements for the built-in prompt templates.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    pub classify: Option<String>,
    pub local: Option<String>,
    pub global: Option<String>,
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load the config file at `path`, or the defaults when the file is absent.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::minimal())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    // Retrieval
    if config.retrieval.k == 0 {
        anyhow::bail!("retrieval.k must be >= 1");
    }
    if config.retrieval.fetch_k < config.retrieval.k {
        anyhow::bail!("retrieval.fetch_k must be >= retrieval.k");
    }
    if !(0.0..=1.0).contains(&config.retrieval.diversity) {
        anyhow::bail!("retrieval.diversity must be in [0.0, 1.0]");
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0 when set");
    }
    match config.embedding.provider.as_str() {
        "gemini" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini, openai, ollama, or local.",
            other
        ),
    }

    // Language model
    match config.llm.provider.as_str() {
        "gemini" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be gemini, openai, or ollama.",
            other
        ),
    }

    // Server
    if config.server.max_sessions == 0 {
        anyhow::bail!("server.max_sessions must be >= 1");
    }
    if let Some(origin) = config
        .server
        .cors_origins
        .iter()
        .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
    {
        anyhow::bail!(
            "server.cors_origins entry '{}' must start with http:// or https://",
            origin
        );
    }

    crate::prompts::validate_overrides(&config.prompts)?;

    Ok(())
}

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_API_PREFIX: &str = "/api";
const DEFAULT_CHAT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_CHAT_MODEL: &str = "openrouter/free";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the research assistant server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Path prefix under which every API route is mounted.
    pub api_prefix: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the offline `hash` provider.
    pub embedding_dimension: usize,
    /// API key for hosted embedding providers.
    pub embedding_api_key: Option<String>,
    /// Base URL override for the embedding provider.
    pub embedding_base_url: Option<String>,
    /// Maximum number of chunks sent per embedding request.
    pub embedding_batch_size: usize,
    /// Chat-completion provider used for answers and summaries.
    pub chat_provider: ChatProvider,
    /// Chat model identifier passed to the provider.
    pub chat_model: String,
    /// API key for the hosted chat provider.
    pub chat_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible chat endpoint.
    pub chat_base_url: String,
    /// Sampling temperature for generation.
    pub chat_temperature: f32,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: String,
    /// Target chunk length, measured by `text_splitter_length`.
    pub text_splitter_chunk_size: usize,
    /// Overlap between adjacent chunks on the same page.
    pub text_splitter_chunk_overlap: usize,
    /// Length function used by the splitter.
    pub text_splitter_length: LengthUnit,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Number of leading pages fed to the summarizer.
    pub summary_page_limit: usize,
    /// Upper bound for multipart upload bodies, in bytes.
    pub max_upload_bytes: usize,
    /// Request timeout applied to outbound provider calls.
    pub http_timeout_secs: u64,
    /// Allowed CORS origins; `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Google Gemini embeddings API.
    Gemini,
    /// Deterministic offline hashing, useful for development and tests.
    Hash,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    /// OpenAI-compatible `/chat/completions` (OpenAI, OpenRouter, vLLM, ...).
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Length function used when splitting pages into chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    /// Unicode scalar count.
    Characters,
    /// `cl100k_base` token count.
    Tokens,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let embedding_provider = parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Hash)?;
        let embedding_model = load_env_optional("EMBEDDING_MODEL")
            .unwrap_or_else(|| default_embedding_model(embedding_provider).to_string());
        let embedding_api_key = load_env_optional("EMBEDDING_API_KEY");
        if matches!(
            embedding_provider,
            EmbeddingProvider::OpenAI | EmbeddingProvider::Gemini
        ) && embedding_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("EMBEDDING_API_KEY".into()));
        }

        let chat_provider = parse_or("CHAT_PROVIDER", ChatProvider::OpenAI)?;
        let chat_api_key = load_env_optional("CHAT_API_KEY");
        if chat_provider == ChatProvider::OpenAI && chat_api_key.is_none() {
            return Err(ConfigError::MissingVariable("CHAT_API_KEY".into()));
        }

        let chunk_size: usize = parse_or("TEXT_SPLITTER_CHUNK_SIZE", 1000)?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        let chunk_overlap: usize = parse_or("TEXT_SPLITTER_CHUNK_OVERLAP", 200)?;
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }

        Ok(Self {
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            api_prefix: normalize_prefix(
                &load_env_optional("API_PREFIX").unwrap_or_else(|| DEFAULT_API_PREFIX.into()),
            ),
            embedding_provider,
            embedding_model,
            embedding_dimension: positive("EMBEDDING_DIMENSION", 768)?,
            embedding_api_key,
            embedding_base_url: load_env_optional("EMBEDDING_BASE_URL"),
            embedding_batch_size: positive("EMBEDDING_BATCH_SIZE", 64)?,
            chat_provider,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_api_key,
            chat_base_url: load_env_optional("CHAT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_BASE_URL.to_string()),
            chat_temperature: parse_or("CHAT_TEMPERATURE", 0.0)?,
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            text_splitter_chunk_size: chunk_size,
            text_splitter_chunk_overlap: chunk_overlap,
            text_splitter_length: parse_or("TEXT_SPLITTER_LENGTH", LengthUnit::Characters)?,
            retrieval_top_k: positive("RETRIEVAL_TOP_K", 4)?,
            summary_page_limit: positive("SUMMARY_PAGE_LIMIT", 5)?,
            max_upload_bytes: positive("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 120)?,
            cors_origins: load_env_optional("CORS_ORIGINS")
                .and_then(|value| parse_origins(&value)),
        })
    }
}

fn default_embedding_model(provider: EmbeddingProvider) -> &'static str {
    match provider {
        EmbeddingProvider::OpenAI => "text-embedding-3-small",
        EmbeddingProvider::Ollama => "nomic-embed-text",
        EmbeddingProvider::Gemini => "models/gemini-embedding-001",
        EmbeddingProvider::Hash => "hash",
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

fn positive(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = parse_or(key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// `*` (or an empty list) means any origin.
fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        None
    } else {
        Some(origins)
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

impl FromStr for ChatProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openrouter" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for LengthUnit {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "characters" | "chars" => Ok(Self::Characters),
            "tokens" => Ok(Self::Tokens),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// `env_file` overrides the default `.env` lookup.
pub fn init_config(env_file: Option<&std::path::Path>) {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path).expect("Failed to load env file");
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        server_port = ?config.server_port,
        api_prefix = %config.api_prefix,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        chat_provider = ?config.chat_provider,
        chat_model = %config.chat_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(normalize_prefix("api/"), "/api");
        assert_eq!(normalize_prefix("/v1/rag"), "/v1/rag");
        assert_eq!(normalize_prefix("/"), "");
    }

    #[test]
    fn wildcard_origin_allows_any() {
        assert_eq!(parse_origins("*"), None);
        assert_eq!(parse_origins(" , "), None);
        assert_eq!(
            parse_origins("http://localhost:5173, https://app.example.org"),
            Some(vec![
                "http://localhost:5173".to_string(),
                "https://app.example.org".to_string()
            ])
        );
    }

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!("OpenRouter".parse::<ChatProvider>(), Ok(ChatProvider::OpenAI));
        assert_eq!("GEMINI".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Gemini));
        assert_eq!("chars".parse::<LengthUnit>(), Ok(LengthUnit::Characters));
        assert!("faiss".parse::<EmbeddingProvider>().is_err());
    }
}

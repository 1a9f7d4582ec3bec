use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use thiserror::Error;

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiEmbeddingClient;
pub use ollama::OllamaEmbeddingClient;
pub use openai::OpenAiEmbeddingClient;

const USER_AGENT: &str = "research-assistant/embeddings";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded or did not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic offline embedding client.
///
/// Hashes each word into one of `dimension` slots and L2-normalizes the counts. Texts that share
/// vocabulary land close together, which is enough for development and tests but carries no
/// semantics.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a hashing client producing vectors of `dimension` slots.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for word in text.split_whitespace() {
            let mut letters = word
                .chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .peekable();
            if letters.peek().is_none() {
                continue;
            }
            let hash = letters.fold(0usize, |acc, c| {
                acc.wrapping_mul(31).wrapping_add(c as usize)
            });
            embedding[hash % dimension] += 1.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        Ok(texts
            .into_iter()
            .map(|text| Self::encode(&text, self.dimension))
            .collect())
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let api_key = config.embedding_api_key.clone();
    let model = config.embedding_model.clone();
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %model,
        "Building embedding client"
    );

    let client: Box<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Hash => Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
        EmbeddingProvider::OpenAI => Box::new(OpenAiEmbeddingClient::new(
            config
                .embedding_base_url
                .clone()
                .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
            model,
            api_key,
            timeout,
        )?),
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new(
            config
                .embedding_base_url
                .clone()
                .unwrap_or_else(|| config.ollama_url.clone()),
            model,
            timeout,
        )?),
        EmbeddingProvider::Gemini => Box::new(GeminiEmbeddingClient::new(
            config
                .embedding_base_url
                .clone()
                .unwrap_or_else(|| gemini::DEFAULT_BASE_URL.to_string()),
            model,
            api_key.ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable("Gemini requires an API key".into())
            })?,
            timeout,
        )?),
    };
    Ok(client)
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, EmbeddingClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|error| {
            EmbeddingClientError::ProviderUnavailable(format!(
                "failed to build HTTP client: {error}"
            ))
        })
}

/// Map a non-success provider response into an error carrying the response body.
async fn error_for_status(
    provider: &str,
    endpoint: &str,
    response: Response,
) -> EmbeddingClientError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return EmbeddingClientError::ProviderUnavailable(format!(
            "{provider} endpoint {endpoint} returned 404"
        ));
    }
    let body = response.text().await.unwrap_or_default();
    EmbeddingClientError::GenerationFailed(format!("{provider} returned {status}: {body}"))
}

fn ensure_count(expected: usize, actual: usize) -> Result<(), EmbeddingClientError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected} embeddings, got {actual}"
        )))
    }
}

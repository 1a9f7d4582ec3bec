//! Google Gemini `batchEmbedContents` adapter.

use super::{
    EmbeddingClient, EmbeddingClientError, build_http_client, ensure_count, error_for_status,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Embedding client for the Gemini API.
pub struct GeminiEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingClient {
    /// Build a client for `model`, accepting both `gemini-embedding-001` and
    /// `models/gemini-embedding-001` spellings.
    pub fn new(
        base_url: String,
        model: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{model}")
        };
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            model,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let payload = BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: [Part { text }],
                    },
                })
                .collect(),
        };

        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            return Err(error_for_status("Gemini", &endpoint, response).await);
        }

        let body: BatchResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;
        ensure_count(texts.len(), body.embeddings.len())?;
        Ok(body
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn batches_requests_with_prefixed_model() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-embedding-001:batchEmbedContents")
                    .header("x-goog-api-key", "g-key")
                    .json_body(json!({
                        "requests": [
                            {
                                "model": "models/gemini-embedding-001",
                                "content": { "parts": [{ "text": "page one" }] }
                            },
                            {
                                "model": "models/gemini-embedding-001",
                                "content": { "parts": [{ "text": "page two" }] }
                            }
                        ]
                    }));
                then.status(200).json_body(json!({
                    "embeddings": [{ "values": [1.0, 0.0] }, { "values": [0.0, 1.0] }]
                }));
            })
            .await;

        let client = GeminiEmbeddingClient::new(
            server.url("/v1beta"),
            "gemini-embedding-001".into(),
            "g-key".into(),
            Duration::from_secs(5),
        )
        .expect("client");
        let vectors = client
            .generate_embeddings(vec!["page one".into(), "page two".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }
}

use super::{ChatClient, ChatClientError, ChatMessage, build_http_client, error_for_status};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints such as OpenRouter.
pub struct OpenAiChatClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChatClient {
    /// Build a client targeting `base_url` (for example `https://openrouter.ai/api/v1`).
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ChatClientError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            model,
            api_key,
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatClientError> {
        let endpoint = self.endpoint();
        let mut request = self
            .http
            .post(&endpoint)
            .header("X-Title", "Research Assistant")
            .json(&CompletionRequest {
                model: &self.model,
                messages: &messages,
                temperature: self.temperature,
            });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            "Requesting chat completion"
        );
        let response = request.send().await.map_err(|error| {
            ChatClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            return Err(error_for_status("Chat provider", &endpoint, response).await);
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            ChatClientError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ChatClientError::InvalidResponse("response contained no choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> OpenAiChatClient {
        OpenAiChatClient::new(
            server.url("/api/v1"),
            "openrouter/free".into(),
            Some("sk-or-test".into()),
            0.0,
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/chat/completions")
                    .header("authorization", "Bearer sk-or-test")
                    .json_body(json!({
                        "model": "openrouter/free",
                        "messages": [
                            { "role": "system", "content": "Be terse." },
                            { "role": "user", "content": "Hi?" }
                        ],
                        "temperature": 0.0
                    }));
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "  Hello.  " } }]
                }));
            })
            .await;

        let answer = client_for(&server)
            .complete(vec![ChatMessage::system("Be terse."), ChatMessage::user("Hi?")])
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(answer, "Hello.");
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server)
            .complete(vec![ChatMessage::user("Hi?")])
            .await
            .expect_err("no choices");
        assert!(matches!(error, ChatClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn error_status_is_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = client_for(&server)
            .complete(vec![ChatMessage::user("Hi?")])
            .await
            .expect_err("error response");
        assert!(
            matches!(&error, ChatClientError::GenerationFailed(message) if message.contains("500"))
        );
    }
}

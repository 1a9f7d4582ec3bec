//! Chat-completion clients used for grounded answers and summaries.
//!
//! Two providers are supported: any OpenAI-compatible `/chat/completions` endpoint (OpenAI
//! itself, OpenRouter, vLLM gateways) and a local Ollama runtime. Both issue plain HTTP
//! requests through `reqwest` and return the first completion as text.

use crate::config::{ChatProvider, Config};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

mod ollama;
mod openai;

pub use ollama::OllamaChatClient;
pub use openai::OpenAiChatClient;

const USER_AGENT: &str = "research-assistant/chat";

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum ChatClientError {
    /// Provider was unreachable or the endpoint does not exist.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// End-user input.
    User,
    /// Model output from an earlier turn.
    Assistant,
}

/// Single message passed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Interface implemented by chat-completion providers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Generate a completion for the ordered conversation.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatClientError>;
}

/// Build a chat client based on configuration.
pub fn get_chat_client(config: &Config) -> Result<Box<dyn ChatClient>, ChatClientError> {
    let timeout = Duration::from_secs(config.http_timeout_secs);
    tracing::debug!(
        provider = ?config.chat_provider,
        model = %config.chat_model,
        "Building chat client"
    );
    let client: Box<dyn ChatClient> = match config.chat_provider {
        ChatProvider::OpenAI => Box::new(OpenAiChatClient::new(
            config.chat_base_url.clone(),
            config.chat_model.clone(),
            config.chat_api_key.clone(),
            config.chat_temperature,
            timeout,
        )?),
        ChatProvider::Ollama => Box::new(OllamaChatClient::new(
            config.ollama_url.clone(),
            config.chat_model.clone(),
            config.chat_temperature,
            timeout,
        )?),
    };
    Ok(client)
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ChatClientError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|error| {
            ChatClientError::ProviderUnavailable(format!("failed to build HTTP client: {error}"))
        })
}

async fn error_for_status(provider: &str, endpoint: &str, response: Response) -> ChatClientError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ChatClientError::ProviderUnavailable(format!(
            "{provider} endpoint {endpoint} returned 404"
        ));
    }
    let body = response.text().await.unwrap_or_default();
    ChatClientError::GenerationFailed(format!("{provider} returned {status}: {body}"))
}

//! Chat model client.
//!
//! Sends tutoring conversations to an OpenAI-compatible chat-completions
//! endpoint and returns the assistant's reply. The transport lives behind the
//! [`ChatModel`] trait so request handlers and tests can swap in scripted
//! models without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ClientError, Result};

/// Default chat-completions API base URL.
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model identifier sent with completion requests.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One message in a chat-completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Speaker role: `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatTurn {
    /// Creates a turn with an arbitrary role.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Creates a `system` turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Creates a `user` turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Creates an `assistant` turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Options for constructing an [`HttpChatModel`].
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Base URL of the chat-completions API.
    pub base_url: String,
    /// Model identifier to request.
    pub model: String,
    /// Bearer token sent with each request.
    pub api_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ChatOptions {
    /// Creates options for the given API key, with defaults for everything else.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A conversational model that can continue a tutoring dialogue.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends the conversation and returns the assistant's reply text.
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String>;
}

/// HTTP client for an OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct HttpChatModel {
    client: reqwest::Client,
    options: ChatOptions,
}

impl HttpChatModel {
    /// Creates a client from the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options fail validation or the underlying HTTP
    /// client cannot be built.
    pub fn new(options: ChatOptions) -> Result<Self> {
        validate_options(&options)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|err| {
                ClientError::invalid_options(
                    err.to_string(),
                    "Check TLS and proxy settings on this host",
                )
            })?;
        Ok(Self { client, options })
    }

    /// Returns the configured model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.options.model
    }
}

fn validate_options(options: &ChatOptions) -> Result<()> {
    if options.api_key.trim().is_empty() {
        return Err(ClientError::invalid_options(
            "chat API key is empty",
            "Provide a non-empty API key for the chat-completions service",
        ));
    }
    if options.base_url.trim().is_empty() {
        return Err(ClientError::invalid_options(
            "chat base URL is empty",
            "Provide the base URL of an OpenAI-compatible API",
        ));
    }
    if options.timeout_secs == 0 {
        return Err(ClientError::invalid_options(
            "chat timeout is zero",
            "Use a timeout of at least one second",
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl ChatModel for HttpChatModel {
    #[instrument(skip(self, turns), fields(model = %self.options.model, turns = turns.len()))]
    async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.options.base_url.trim_end_matches('/')
        );
        let request = CompletionRequest {
            model: &self.options.model,
            messages: turns,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.options.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ClientError::from_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), &body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|err| ClientError::from_transport(&err))?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ClientError::unexpected("completion had no choices"))?;

        debug!(reply_chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}

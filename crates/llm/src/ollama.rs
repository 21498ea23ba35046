//! Client for a local Ollama server (`POST /api/chat`, non-streaming).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::TextCompletion;
use crate::completion::{Completion, Segment};
use crate::error::LlmError;
use crate::model::{ChatMessage, CompletionRequest, ToolDefinition};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Ollama connection settings.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<ChatMessage>,
}

/// HTTP client for one Ollama model.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextCompletion for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatBody {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion",
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let reply: ChatReply = Self::ensure_success(response).await?.json().await?;
        let message = reply
            .message
            .ok_or_else(|| LlmError::InvalidResponse("reply has no message".into()))?;

        Ok(into_completion(message))
    }

    async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/api/version", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "Ollama liveness probe failed");
                false
            }
        }
    }
}

fn into_completion(message: ChatMessage) -> Completion {
    if message.tool_calls.is_empty() {
        return Completion::PlainText(message.content);
    }

    let mut segments = Vec::with_capacity(message.tool_calls.len() + 1);
    if !message.content.trim().is_empty() {
        segments.push(Segment::Text {
            text: message.content,
        });
    }
    segments.extend(message.tool_calls.into_iter().map(|call| Segment::ToolUse {
        name: call.function.name,
        arguments: call.function.arguments,
    }));
    Completion::Segments(segments)
}

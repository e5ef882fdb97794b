pub mod claude;
pub mod openai;
mod sse;
pub mod types;

pub use claude::ClaudeClient;
pub use openai::OpenAiClient;
pub use types::{AiResponse, ToolCall, ToolHistoryEntry, ToolResponse};

use crate::config::Config;
use crate::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Unified AI client that works with any configured backend family.
///
/// The variant decides which function-calling convention the agent loop
/// speaks; the two conventions are not interchangeable on the wire.
#[derive(Clone)]
pub enum AiClient {
    OpenAi(OpenAiClient),
    Claude(ClaudeClient),
}

impl AiClient {
    /// Create an AI client from process configuration
    pub fn from_config(config: &Config) -> Result<Self, String> {
        match config.backend.as_str() {
            "openai" => {
                let client = OpenAiClient::new(
                    &config.api_key,
                    config.endpoint.as_deref(),
                    config.model.as_deref(),
                    Some(config.max_tokens),
                )?;
                Ok(AiClient::OpenAi(client))
            }
            "claude" | "anthropic" => {
                let client = ClaudeClient::new(
                    &config.api_key,
                    config.endpoint.as_deref(),
                    config.model.as_deref(),
                    Some(config.max_tokens),
                )?;
                Ok(AiClient::Claude(client))
            }
            other => Err(format!("unknown model backend family: {}", other)),
        }
    }

    /// Generate a response with tool support
    pub async fn generate_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: &[ToolHistoryEntry],
        tools: &[ToolDefinition],
    ) -> Result<AiResponse, String> {
        match self {
            AiClient::OpenAi(client) => {
                let tool_messages = Self::tool_history_to_openai(tool_history);
                client
                    .generate_with_tools(messages, tool_messages, tools)
                    .await
            }
            AiClient::Claude(client) => {
                let tool_messages = Self::tool_history_to_claude(tool_history);
                client
                    .generate_with_tools(messages, tool_messages, tools)
                    .await
            }
        }
    }

    /// Generate a response with tool support, forwarding text deltas to
    /// `token_tx` as they arrive. The returned response carries the full
    /// accumulated content and any tool calls.
    pub async fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: &[ToolHistoryEntry],
        tools: &[ToolDefinition],
        token_tx: mpsc::Sender<String>,
    ) -> Result<AiResponse, String> {
        match self {
            AiClient::OpenAi(client) => {
                let tool_messages = Self::tool_history_to_openai(tool_history);
                client
                    .stream_with_tools(messages, tool_messages, tools, token_tx)
                    .await
            }
            AiClient::Claude(client) => {
                let tool_messages = Self::tool_history_to_claude(tool_history);
                client
                    .stream_with_tools(messages, tool_messages, tools, token_tx)
                    .await
            }
        }
    }

    /// Issue one structured-output call and return the conforming JSON value.
    ///
    /// The mechanism differs per family: the OpenAI convention uses a JSON
    /// schema response format, the Claude convention forces a single tool
    /// whose input is the schema. Both run at temperature zero.
    pub async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, String> {
        match self {
            AiClient::OpenAi(client) => {
                client
                    .generate_structured(system, user, schema_name, schema)
                    .await
            }
            AiClient::Claude(client) => {
                client
                    .generate_structured(system, user, schema_name, schema)
                    .await
            }
        }
    }

    /// Convert tool history to OpenAI-convention messages
    fn tool_history_to_openai(history: &[ToolHistoryEntry]) -> Vec<openai::OpenAiMessage> {
        let mut messages = Vec::new();
        for entry in history {
            messages.extend(OpenAiClient::build_tool_result_messages(
                &entry.tool_calls,
                &entry.tool_responses,
            ));
        }
        messages
    }

    /// Convert tool history to Claude-convention messages
    fn tool_history_to_claude(history: &[ToolHistoryEntry]) -> Vec<claude::ClaudeMessage> {
        let mut messages = Vec::new();
        for entry in history {
            messages.extend(ClaudeClient::build_tool_result_messages(
                &entry.tool_calls,
                &entry.tool_responses,
            ));
        }
        messages
    }
}

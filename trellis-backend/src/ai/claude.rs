use crate::ai::sse::drain_sse_data_lines;
use crate::ai::types::{AiResponse, ToolCall};
use crate::ai::{Message, MessageRole};
use crate::tools::ToolDefinition;
use futures_util::StreamExt;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ClaudeCompletionRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: String,
    pub content: ClaudeMessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeMessageContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ClaudeCompletionResponse {
    content: Vec<ClaudeResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    message: String,
}

/// Accumulates one tool_use block across streamed deltas
#[derive(Debug, Default, Clone)]
struct ToolUseDraft {
    id: String,
    name: String,
    input_json: String,
}

impl ClaudeClient {
    pub fn new(
        api_key: &str,
        endpoint: Option<&str>,
        model: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<Self, String> {
        let endpoint_url = endpoint
            .unwrap_or("https://api.anthropic.com/v1/messages")
            .to_string();

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        if !api_key.is_empty() {
            let key_value = header::HeaderValue::from_str(api_key)
                .map_err(|e| format!("Invalid API key format: {}", e))?;
            headers.insert("x-api-key", key_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let model_name = match model {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => "claude-sonnet-4-20250514".to_string(),
        };

        Ok(Self {
            client,
            endpoint: endpoint_url,
            model: model_name,
            max_tokens: max_tokens.unwrap_or(4096),
        })
    }

    pub async fn generate_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ClaudeMessage>,
        tools: &[ToolDefinition],
    ) -> Result<AiResponse, String> {
        let request = self.build_request(messages, tool_history, tools, false, None, None);

        log::debug!(
            "[CLAUDE] Sending request to {} with model {} and {} tools",
            self.endpoint,
            self.model,
            tools.len()
        );

        let response_text = self.post(&request).await?;

        let response_data: ClaudeCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response: {} - body: {}", e, response_text))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in response_data.content {
            match block {
                ClaudeResponseBlock::Text { text } => content.push_str(&text),
                ClaudeResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: input,
                    });
                }
                ClaudeResponseBlock::Other => {}
            }
        }

        let stop_reason = response_data
            .stop_reason
            .or_else(|| Some(if tool_calls.is_empty() { "end_turn" } else { "tool_use" }.to_string()));

        Ok(AiResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    /// One structured-output call. The Claude convention has no JSON-schema
    /// response format, so the schema is forced through a single tool whose
    /// input the model must fill.
    pub async fn generate_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value, String> {
        let messages = vec![
            Message::system(system.to_string()),
            Message::user(user.to_string()),
        ];
        let tool = ClaudeTool {
            name: schema_name.to_string(),
            description: "Record the structured result.".to_string(),
            input_schema: schema.clone(),
        };
        let tool_choice = json!({"type": "tool", "name": schema_name});
        let request = self.build_request(
            messages,
            vec![],
            &[],
            false,
            Some(0.0),
            Some((vec![tool], tool_choice)),
        );

        let response_text = self.post(&request).await?;

        let response_data: ClaudeCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response: {} - body: {}", e, response_text))?;

        for block in response_data.content {
            if let ClaudeResponseBlock::ToolUse { input, .. } = block {
                return Ok(input);
            }
        }

        Err("Backend returned no structured output block".to_string())
    }

    /// Streaming variant of `generate_with_tools`. Text deltas are forwarded
    /// to `token_tx`; tool_use inputs are accumulated from their partial-JSON
    /// deltas and returned with the full response.
    pub async fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ClaudeMessage>,
        tools: &[ToolDefinition],
        token_tx: mpsc::Sender<String>,
    ) -> Result<AiResponse, String> {
        let request = self.build_request(messages, tool_history, tools, true, None, None);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Backend request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<ClaudeErrorResponse>(&error_text) {
                return Err(format!("Backend error: {}", error_response.error.message));
            }
            return Err(format!(
                "Backend returned error status: {}, body: {}",
                status, error_text
            ));
        }

        let mut byte_stream = response.bytes_stream();
        let mut line_buf = String::new();
        let mut content = String::new();
        // index-keyed because text and tool_use blocks interleave
        let mut drafts: Vec<Option<ToolUseDraft>> = Vec::new();
        let mut stop_reason: Option<String> = None;
        let mut done = false;

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| format!("Stream read failed: {}", e))?;
            line_buf.push_str(&String::from_utf8_lossy(&bytes));

            for data in drain_sse_data_lines(&mut line_buf) {
                let value: Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("[CLAUDE] Skipping unparseable stream event: {}", e);
                        continue;
                    }
                };
                match apply_stream_event(&value, &mut content, &mut drafts, &mut stop_reason) {
                    StreamStep::Token(text) => {
                        if !text.is_empty() {
                            let _ = token_tx.send(text).await;
                        }
                    }
                    StreamStep::Stop => {
                        done = true;
                        break;
                    }
                    StreamStep::Continue => {}
                }
            }
            if done {
                break;
            }
        }

        let tool_calls: Vec<ToolCall> = drafts
            .into_iter()
            .flatten()
            .map(|d| ToolCall {
                id: d.id,
                name: d.name,
                arguments: if d.input_json.is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&d.input_json).unwrap_or(json!({}))
                },
            })
            .collect();

        let stop_reason = stop_reason
            .or_else(|| Some(if tool_calls.is_empty() { "end_turn" } else { "tool_use" }.to_string()));

        Ok(AiResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    #[allow(clippy::type_complexity)]
    fn build_request(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<ClaudeMessage>,
        tools: &[ToolDefinition],
        stream: bool,
        temperature: Option<f32>,
        forced_tool: Option<(Vec<ClaudeTool>, Value)>,
    ) -> ClaudeCompletionRequest {
        // System turns move into the dedicated system field
        let mut system_parts = Vec::new();
        let mut api_messages = Vec::new();
        for m in messages {
            match m.role {
                MessageRole::System => system_parts.push(m.content),
                MessageRole::User => api_messages.push(ClaudeMessage {
                    role: "user".to_string(),
                    content: ClaudeMessageContent::Text(m.content),
                }),
                MessageRole::Assistant => api_messages.push(ClaudeMessage {
                    role: "assistant".to_string(),
                    content: ClaudeMessageContent::Text(m.content),
                }),
            }
        }
        api_messages.extend(tool_history);

        let (claude_tools, tool_choice) = match forced_tool {
            Some((forced, choice)) => (Some(forced), Some(choice)),
            None if tools.is_empty() => (None, None),
            None => (
                Some(
                    tools
                        .iter()
                        .map(|t| ClaudeTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: serde_json::to_value(&t.input_schema)
                                .unwrap_or(json!({"type": "object"})),
                        })
                        .collect(),
                ),
                None,
            ),
        };

        ClaudeCompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: api_messages,
            temperature,
            stream: if stream { Some(true) } else { None },
            tools: claude_tools,
            tool_choice,
        }
    }

    async fn post(&self, request: &ClaudeCompletionRequest) -> Result<String, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| format!("Backend request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<ClaudeErrorResponse>(&error_text) {
                return Err(format!("Backend error: {}", error_response.error.message));
            }
            return Err(format!(
                "Backend returned error status: {}, body: {}",
                status, error_text
            ));
        }

        response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {}", e))
    }

    /// Build tool result messages for continuing after tool execution
    pub fn build_tool_result_messages(
        tool_calls: &[ToolCall],
        tool_responses: &[crate::ai::ToolResponse],
    ) -> Vec<ClaudeMessage> {
        let tool_use_blocks: Vec<ClaudeContentBlock> = tool_calls
            .iter()
            .map(|tc| ClaudeContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.name.clone(),
                input: tc.arguments.clone(),
            })
            .collect();

        let result_blocks: Vec<ClaudeContentBlock> = tool_responses
            .iter()
            .map(|tr| ClaudeContentBlock::ToolResult {
                tool_use_id: tr.tool_call_id.clone(),
                content: tr.content.clone(),
                is_error: tr.is_error,
            })
            .collect();

        vec![
            ClaudeMessage {
                role: "assistant".to_string(),
                content: ClaudeMessageContent::Blocks(tool_use_blocks),
            },
            ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeMessageContent::Blocks(result_blocks),
            },
        ]
    }
}

enum StreamStep {
    Token(String),
    Stop,
    Continue,
}

/// Fold one parsed stream event into the accumulated state
fn apply_stream_event(
    event: &Value,
    content: &mut String,
    drafts: &mut Vec<Option<ToolUseDraft>>,
    stop_reason: &mut Option<String>,
) -> StreamStep {
    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match event_type {
        "content_block_start" => {
            let index = event.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            if drafts.len() <= index {
                drafts.resize(index + 1, None);
            }
            if let Some(block) = event.get("content_block") {
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    drafts[index] = Some(ToolUseDraft {
                        id: block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        name: block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        input_json: String::new(),
                    });
                }
            }
            StreamStep::Continue
        }
        "content_block_delta" => {
            let index = event.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            let Some(delta) = event.get("delta") else {
                return StreamStep::Continue;
            };
            match delta.get("type").and_then(|v| v.as_str()) {
                Some("text_delta") => {
                    let text = delta.get("text").and_then(|v| v.as_str()).unwrap_or("");
                    content.push_str(text);
                    StreamStep::Token(text.to_string())
                }
                Some("input_json_delta") => {
                    if let Some(Some(draft)) = drafts.get_mut(index) {
                        if let Some(partial) = delta.get("partial_json").and_then(|v| v.as_str()) {
                            draft.input_json.push_str(partial);
                        }
                    }
                    StreamStep::Continue
                }
                _ => StreamStep::Continue,
            }
        }
        "message_delta" => {
            if let Some(reason) = event
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
            {
                *stop_reason = Some(reason.to_string());
            }
            StreamStep::Continue
        }
        "message_stop" => StreamStep::Stop,
        _ => StreamStep::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_stream_event_text_then_tool_use() {
        let mut content = String::new();
        let mut drafts = Vec::new();
        let mut stop = None;

        let text_delta = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "Checking"}
        });
        let tool_start = json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": {"type": "tool_use", "id": "toolu_1", "name": "get_weather"}
        });
        let tool_delta = json!({
            "type": "content_block_delta",
            "index": 1,
            "delta": {"type": "input_json_delta", "partial_json": "{\"city\":\"Oslo\"}"}
        });
        let message_delta = json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use"}
        });

        assert!(matches!(
            apply_stream_event(&text_delta, &mut content, &mut drafts, &mut stop),
            StreamStep::Token(_)
        ));
        apply_stream_event(&tool_start, &mut content, &mut drafts, &mut stop);
        apply_stream_event(&tool_delta, &mut content, &mut drafts, &mut stop);
        apply_stream_event(&message_delta, &mut content, &mut drafts, &mut stop);

        assert_eq!(content, "Checking");
        let draft = drafts[1].as_ref().unwrap();
        assert_eq!(draft.name, "get_weather");
        assert_eq!(draft.input_json, "{\"city\":\"Oslo\"}");
        assert_eq!(stop.as_deref(), Some("tool_use"));
    }

    #[test]
    fn test_tool_result_messages_pair_assistant_and_user() {
        let calls = vec![ToolCall {
            id: "toolu_1".to_string(),
            name: "calculator".to_string(),
            arguments: json!({"expression": "2+2"}),
        }];
        let responses = vec![crate::ai::ToolResponse {
            tool_call_id: "toolu_1".to_string(),
            content: "4".to_string(),
            is_error: false,
        }];

        let messages = ClaudeClient::build_tool_result_messages(&calls, &responses);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[1].role, "user");
    }
}

use crate::ai::sse::drain_sse_data_lines;
use crate::ai::types::{AiResponse, ToolCall};
use crate::ai::Message;
use crate::tools::ToolDefinition;
use futures_util::StreamExt;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAiCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiCompletionResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}

/// Accumulates one tool call across streamed deltas
#[derive(Debug, Default, Clone)]
struct ToolCallDraft {
    id: String,
    name: String,
    arguments: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        endpoint: Option<&str>,
        model: Option<&str>,
        max_tokens: Option<u32>,
    ) -> Result<Self, String> {
        let endpoint_url = endpoint
            .unwrap_or("https://api.openai.com/v1/chat/completions")
            .to_string();

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        // Only add auth header if API key is provided and not empty
        if !api_key.is_empty() {
            let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?;
            headers.insert(header::AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let model_name = match model {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => "gpt-4o-mini".to_string(),
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
        tool_history: Vec<OpenAiMessage>,
        tools: &[ToolDefinition],
    ) -> Result<AiResponse, String> {
        let request = self.build_request(messages, tool_history, tools, false, None, None);

        log::debug!(
            "[OPENAI] Sending request to {} with model {} and {} tools",
            self.endpoint,
            self.model,
            tools.len()
        );

        let response_text = self.post(&request).await?;

        let response_data: OpenAiCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response: {} - body: {}", e, response_text))?;

        let choice = response_data
            .choices
            .first()
            .ok_or_else(|| "Backend returned no choices".to_string())?;

        let content = choice.message.content.clone().unwrap_or_default();
        let finish_reason = choice.finish_reason.clone();

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .as_ref()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: serde_json::from_str(&tc.function.arguments)
                            .unwrap_or(json!({})),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let is_tool_use = finish_reason.as_deref() == Some("tool_calls") || !tool_calls.is_empty();

        Ok(AiResponse {
            content,
            tool_calls,
            stop_reason: Some(if is_tool_use { "tool_use" } else { "end_turn" }.to_string()),
        })
    }

    /// One structured-output call via the JSON-schema response format.
    /// Runs at temperature zero; the parsed content value is returned as-is.
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
        let response_format = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema_name,
                "schema": schema,
                "strict": true
            }
        });
        let request =
            self.build_request(messages, vec![], &[], false, Some(0.0), Some(response_format));

        let response_text = self.post(&request).await?;

        let response_data: OpenAiCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response: {} - body: {}", e, response_text))?;

        let content = response_data
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| "Backend returned no content for structured call".to_string())?;

        serde_json::from_str(&content)
            .map_err(|e| format!("Structured output is not valid JSON: {} - body: {}", e, content))
    }

    /// Streaming variant of `generate_with_tools`. Text deltas are forwarded
    /// to `token_tx` as they arrive; the full response is accumulated and
    /// returned when the stream ends. A dropped receiver does not abort the
    /// call - accumulation continues so the caller still gets the response.
    pub async fn stream_with_tools(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<OpenAiMessage>,
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
            if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(&error_text) {
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
        let mut drafts: Vec<ToolCallDraft> = Vec::new();
        let mut finish_reason: Option<String> = None;
        let mut done = false;

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| format!("Stream read failed: {}", e))?;
            line_buf.push_str(&String::from_utf8_lossy(&bytes));

            for data in drain_sse_data_lines(&mut line_buf) {
                if data == "[DONE]" {
                    done = true;
                    break;
                }
                let value: Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("[OPENAI] Skipping unparseable stream chunk: {}", e);
                        continue;
                    }
                };
                if let Some(delta) =
                    apply_stream_chunk(&value, &mut content, &mut drafts, &mut finish_reason)
                {
                    if !delta.is_empty() {
                        let _ = token_tx.send(delta).await;
                    }
                }
            }
            if done {
                break;
            }
        }

        let tool_calls: Vec<ToolCall> = drafts
            .into_iter()
            .filter(|d| !d.name.is_empty())
            .map(|d| ToolCall {
                id: d.id,
                name: d.name,
                arguments: serde_json::from_str(&d.arguments).unwrap_or(json!({})),
            })
            .collect();

        let is_tool_use = finish_reason.as_deref() == Some("tool_calls") || !tool_calls.is_empty();

        Ok(AiResponse {
            content,
            tool_calls,
            stop_reason: Some(if is_tool_use { "tool_use" } else { "end_turn" }.to_string()),
        })
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tool_history: Vec<OpenAiMessage>,
        tools: &[ToolDefinition],
        stream: bool,
        temperature: Option<f32>,
        response_format: Option<Value>,
    ) -> OpenAiCompletionRequest {
        let mut api_messages: Vec<OpenAiMessage> = messages
            .into_iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content),
                tool_calls: None,
                tool_call_id: None,
            })
            .collect();

        // Previous tool calls and their results
        api_messages.extend(tool_history);

        let openai_tools: Option<Vec<OpenAiTool>> = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function".to_string(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: serde_json::to_value(&t.input_schema)
                                .unwrap_or(json!({"type": "object"})),
                        },
                    })
                    .collect(),
            )
        };

        OpenAiCompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: self.max_tokens,
            temperature,
            stream: if stream { Some(true) } else { None },
            tool_choice: openai_tools.as_ref().map(|_| "auto".to_string()),
            tools: openai_tools,
            response_format,
        }
    }

    async fn post(&self, request: &OpenAiCompletionRequest) -> Result<String, String> {
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
            if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(&error_text) {
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
    ) -> Vec<OpenAiMessage> {
        let mut messages = Vec::new();

        let openai_tool_calls: Vec<OpenAiToolCall> = tool_calls
            .iter()
            .map(|tc| OpenAiToolCall {
                id: tc.id.clone(),
                call_type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: tc.name.clone(),
                    arguments: serde_json::to_string(&tc.arguments).unwrap_or_default(),
                },
            })
            .collect();

        messages.push(OpenAiMessage {
            role: "assistant".to_string(),
            // Some servers require the content field even when empty
            content: Some("".to_string()),
            tool_calls: Some(openai_tool_calls),
            tool_call_id: None,
        });

        for response in tool_responses {
            messages.push(OpenAiMessage {
                role: "tool".to_string(),
                content: Some(response.content.clone()),
                tool_calls: None,
                tool_call_id: Some(response.tool_call_id.clone()),
            });
        }

        messages
    }
}

/// Fold one parsed stream chunk into the accumulated state. Returns the text
/// delta to forward, if the chunk carried one.
fn apply_stream_chunk(
    chunk: &Value,
    content: &mut String,
    drafts: &mut Vec<ToolCallDraft>,
    finish_reason: &mut Option<String>,
) -> Option<String> {
    let choice = chunk.get("choices")?.get(0)?;

    if let Some(reason) = choice.get("finish_reason").and_then(|v| v.as_str()) {
        *finish_reason = Some(reason.to_string());
    }

    let delta = choice.get("delta")?;

    if let Some(tool_calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tool_calls {
            let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
            if drafts.len() <= index {
                drafts.resize(index + 1, ToolCallDraft::default());
            }
            let draft = &mut drafts[index];
            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                draft.id = id.to_string();
            }
            if let Some(function) = tc.get("function") {
                if let Some(name) = function.get("name").and_then(|v| v.as_str()) {
                    draft.name.push_str(name);
                }
                if let Some(args) = function.get("arguments").and_then(|v| v.as_str()) {
                    draft.arguments.push_str(args);
                }
            }
        }
        return None;
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        content.push_str(text);
        return Some(text.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_stream_chunk_text_delta() {
        let chunk = json!({"choices": [{"delta": {"content": "hello"}}]});
        let mut content = String::new();
        let mut drafts = Vec::new();
        let mut finish = None;

        let delta = apply_stream_chunk(&chunk, &mut content, &mut drafts, &mut finish);
        assert_eq!(delta.as_deref(), Some("hello"));
        assert_eq!(content, "hello");
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_apply_stream_chunk_accumulates_tool_call() {
        let mut content = String::new();
        let mut drafts = Vec::new();
        let mut finish = None;

        let first = json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "function": {"name": "get_weather", "arguments": "{\"ci"}}
        ]}}]});
        let second = json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "ty\":\"Oslo\"}"}}
        ]}}, {"finish_reason": null}]});
        let last = json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]});

        apply_stream_chunk(&first, &mut content, &mut drafts, &mut finish);
        apply_stream_chunk(&second, &mut content, &mut drafts, &mut finish);
        apply_stream_chunk(&last, &mut content, &mut drafts, &mut finish);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, "call_1");
        assert_eq!(drafts[0].name, "get_weather");
        assert_eq!(drafts[0].arguments, "{\"city\":\"Oslo\"}");
        assert_eq!(finish.as_deref(), Some("tool_calls"));
    }
}

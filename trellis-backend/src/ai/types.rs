//! Shared response types for the model-serving backends

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The outcome of one tool invocation, fed back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub content: String,
    pub is_error: bool,
}

/// One round of tool calls and their responses.
///
/// Each backend client converts entries into its own wire format when the
/// conversation is replayed on the next loop iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolHistoryEntry {
    pub tool_calls: Vec<ToolCall>,
    pub tool_responses: Vec<ToolResponse>,
}

impl ToolHistoryEntry {
    pub fn new(tool_calls: Vec<ToolCall>, tool_responses: Vec<ToolResponse>) -> Self {
        Self {
            tool_calls,
            tool_responses,
        }
    }
}

/// Normalized model completion, independent of backend family
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
}

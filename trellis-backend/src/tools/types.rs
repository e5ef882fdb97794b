use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// JSON Schema property definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    pub fn string(description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: "string".to_string(),
            description: description.into(),
            default: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        PropertySchema {
            schema_type: "number".to_string(),
            description: description.into(),
            default: None,
            items: None,
            enum_values: None,
        }
    }
}

/// Tool input schema using JSON Schema format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: vec![],
        }
    }
}

/// Tool definition that gets sent to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// Result of tool execution.
///
/// Tools never fail past this type: any internal fault becomes an error
/// result whose content the agent can read and reason about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        ToolResult {
            success: true,
            content: content.into(),
            error: None,
            metadata: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        ToolResult {
            success: false,
            content: msg.clone(),
            error: Some(msg),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub project_id: Option<String>,
    pub conversation_id: Option<String>,
    pub user_id: Option<String>,
    /// Additional context data, including per-tool credentials
    pub extra: HashMap<String, Value>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Add a credential for a tool, keyed by its function name
    pub fn with_api_key(mut self, function_name: &str, key_value: String) -> Self {
        self.extra.insert(
            format!("api_key_{}", function_name),
            serde_json::json!(key_value),
        );
        self
    }

    /// Get a credential by the tool's function name
    pub fn get_api_key(&self, function_name: &str) -> Option<String> {
        self.extra
            .get(&format!("api_key_{}", function_name))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

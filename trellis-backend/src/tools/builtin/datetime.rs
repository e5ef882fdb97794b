use crate::tools::registry::Tool;
use crate::tools::types::{ToolContext, ToolDefinition, ToolInputSchema, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

/// Injected for projects whose configuration resolves to zero tools, so the
/// agent always has at least one invocable handler.
pub const FALLBACK_TOOL_NAME: &str = "get_current_datetime";

/// Read the current date and time
pub struct CurrentDatetimeTool {
    definition: ToolDefinition,
}

impl CurrentDatetimeTool {
    pub fn new() -> Self {
        CurrentDatetimeTool {
            definition: ToolDefinition {
                name: FALLBACK_TOOL_NAME.to_string(),
                description: "Get the current date and time in UTC.".to_string(),
                input_schema: ToolInputSchema::default(),
            },
        }
    }
}

impl Default for CurrentDatetimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CurrentDatetimeTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, _params: Value, _context: &ToolContext) -> ToolResult {
        let now = Utc::now();
        ToolResult::success(now.to_rfc3339()).with_metadata(json!({
            "unix_timestamp": now.timestamp()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_an_rfc3339_timestamp() {
        let tool = CurrentDatetimeTool::new();
        let result = tool.execute(Value::Null, &ToolContext::new()).await;
        assert!(result.success);
        assert!(chrono::DateTime::parse_from_rfc3339(&result.content).is_ok());
    }
}

use crate::tools::registry::Tool;
use crate::tools::types::{
    PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Basic arithmetic over two operands
pub struct CalculatorTool {
    definition: ToolDefinition,
}

impl CalculatorTool {
    pub fn new() -> Self {
        let mut properties = HashMap::new();
        properties.insert(
            "operation".to_string(),
            PropertySchema {
                schema_type: "string".to_string(),
                description: "The arithmetic operation to apply".to_string(),
                default: None,
                items: None,
                enum_values: Some(vec![
                    "add".to_string(),
                    "subtract".to_string(),
                    "multiply".to_string(),
                    "divide".to_string(),
                ]),
            },
        );
        properties.insert("a".to_string(), PropertySchema::number("First operand"));
        properties.insert("b".to_string(), PropertySchema::number("Second operand"));

        CalculatorTool {
            definition: ToolDefinition {
                name: "calculator".to_string(),
                description: "Perform basic arithmetic on two numbers.".to_string(),
                input_schema: ToolInputSchema {
                    schema_type: "object".to_string(),
                    properties,
                    required: vec!["operation".to_string(), "a".to_string(), "b".to_string()],
                },
            },
        }
    }
}

impl Default for CalculatorTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct CalculatorParams {
    operation: String,
    a: f64,
    b: f64,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    async fn execute(&self, params: Value, _context: &ToolContext) -> ToolResult {
        let params: CalculatorParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("Invalid parameters: {}", e)),
        };

        let result = match params.operation.as_str() {
            "add" => params.a + params.b,
            "subtract" => params.a - params.b,
            "multiply" => params.a * params.b,
            "divide" => {
                if params.b == 0.0 {
                    return ToolResult::error("Division by zero");
                }
                params.a / params.b
            }
            other => return ToolResult::error(format!("Unknown operation: {}", other)),
        };

        ToolResult::success(result.to_string()).with_metadata(json!({
            "operation": params.operation,
            "a": params.a,
            "b": params.b
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let tool = CalculatorTool::new();

        let result = tool
            .execute(
                json!({"operation": "add", "a": 2.0, "b": 3.5}),
                &ToolContext::new(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.content, "5.5");

        let result = tool
            .execute(
                json!({"operation": "divide", "a": 1.0, "b": 0.0}),
                &ToolContext::new(),
            )
            .await;
        assert!(!result.success);
        assert!(result.content.contains("zero"));
    }

    #[tokio::test]
    async fn test_malformed_parameters_become_error_results() {
        let tool = CalculatorTool::new();
        let result = tool
            .execute(json!({"operation": "add"}), &ToolContext::new())
            .await;
        assert!(!result.success);
        assert!(result.content.contains("Invalid parameters"));
    }
}

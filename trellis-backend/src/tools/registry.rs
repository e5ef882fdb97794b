//! Tool registry - process-wide, name-keyed table of invocable handlers
//!
//! The registry is built once at start-up by an explicit registration pass
//! and never mutated afterwards, so it can be shared across tasks without
//! synchronization. Every execution goes through `execute_contained`, which
//! guarantees that neither a panic nor a hung handler can reach the agent
//! loop.

use crate::tools::types::{ToolContext, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// An agent-invocable tool handler
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Wall-clock budget for one call. None means the call may run
    /// until the handler returns on its own.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn execute(&self, params: Value, context: &ToolContext) -> ToolResult;
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its definition name. Only called during
    /// start-up construction; the registry is read-only afterwards.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            log::warn!("[REGISTRY] Tool '{}' registered twice, keeping the later one", name);
        }
    }

    /// O(1) lookup by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a registered tool by name with full containment
    pub async fn execute(&self, name: &str, params: Value, context: &ToolContext) -> ToolResult {
        match self.get(name) {
            Some(tool) => execute_contained(tool, params, context.clone()).await,
            None => ToolResult::error(format!("Unknown tool: {}", name)),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one tool call with panic and timeout containment.
///
/// The handler runs on its own task: a panic surfaces as a join error and is
/// converted to an error result, and a call that outlives its budget is
/// aborted and reported as a timeout. Neither outcome can propagate into the
/// caller as anything other than a `ToolResult`.
pub async fn execute_contained(
    tool: Arc<dyn Tool>,
    params: Value,
    context: ToolContext,
) -> ToolResult {
    let name = tool.definition().name;
    let budget = tool.timeout();

    let mut handle = tokio::spawn(async move { tool.execute(params, &context).await });

    let joined = match budget {
        Some(budget) => match tokio::time::timeout(budget, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                log::warn!(
                    "[REGISTRY] Tool '{}' exceeded its {}s budget and was aborted",
                    name,
                    budget.as_secs()
                );
                return ToolResult::error(format!(
                    "Tool '{}' timed out after {} seconds",
                    name,
                    budget.as_secs()
                ));
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            let reason = match e.into_panic().downcast::<String>() {
                Ok(s) => *s,
                Err(payload) => match payload.downcast::<&'static str>() {
                    Ok(s) => (*s).to_string(),
                    Err(_) => "unknown panic".to_string(),
                },
            };
            log::error!("[REGISTRY] Tool '{}' panicked: {}", name, reason);
            ToolResult::error(format!("Tool '{}' failed: {}", name, reason))
        }
        Err(e) => ToolResult::error(format!("Tool '{}' was cancelled: {}", name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::ToolInputSchema;
    use std::time::Instant;

    struct PanickyTool;

    #[async_trait]
    impl Tool for PanickyTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "panicky".to_string(),
                description: "Always panics".to_string(),
                input_schema: ToolInputSchema::default(),
            }
        }

        async fn execute(&self, _params: Value, _context: &ToolContext) -> ToolResult {
            panic!("boom");
        }
    }

    struct SleepyTool;

    #[async_trait]
    impl Tool for SleepyTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "sleepy".to_string(),
                description: "Sleeps past its budget".to_string(),
                input_schema: ToolInputSchema::default(),
            }
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(100))
        }

        async fn execute(&self, _params: Value, _context: &ToolContext) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ToolResult::success("never reached")
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained_to_a_string_result() {
        let result =
            execute_contained(Arc::new(PanickyTool), Value::Null, ToolContext::new()).await;
        assert!(!result.success);
        assert!(result.content.contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_returns_within_budget_plus_overhead() {
        let start = Instant::now();
        let result =
            execute_contained(Arc::new(SleepyTool), Value::Null, ToolContext::new()).await;
        let elapsed = start.elapsed();

        assert!(!result.success);
        assert!(result.content.contains("timed out"));
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("missing", Value::Null, &ToolContext::new())
            .await;
        assert!(!result.success);
        assert!(result.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_registry_lookup_is_exact_and_case_sensitive() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanickyTool));

        assert!(registry.contains("panicky"));
        assert!(!registry.contains("Panicky"));
        assert!(!registry.contains("panicky "));
    }
}

pub mod builtin;
pub mod registry;
pub mod resolver;
pub mod types;

pub use registry::{execute_contained, Tool, ToolRegistry};
pub use resolver::ToolSetResolver;
pub use types::{PropertySchema, ToolContext, ToolDefinition, ToolInputSchema, ToolResult};

use std::sync::Arc;

/// Register all built-in tools to a registry
fn register_all_tools(registry: &mut ToolRegistry) {
    // Introspection tools (side-effect free, always safe)
    registry.register(Arc::new(builtin::CurrentDatetimeTool::new()));
    registry.register(Arc::new(builtin::CalculatorTool::new()));
}

/// Create a new ToolRegistry with all built-in tools registered
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry);
    registry
}

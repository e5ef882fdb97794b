//! Per-project tool-set resolution
//!
//! A project configures tool function names; only names the registry can
//! actually resolve survive. The agent is never handed an empty tool set -
//! a project with nothing usable gets the date/time introspection tool.

use crate::db::Database;
use crate::error::CoreError;
use crate::tools::builtin::FALLBACK_TOOL_NAME;
use crate::tools::registry::{Tool, ToolRegistry};
use std::sync::Arc;

pub struct ToolSetResolver {
    registry: Arc<ToolRegistry>,
}

impl ToolSetResolver {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Intersect configured names with the registry, preserving configuration
    /// order. Names the registry does not know are dropped silently; exact,
    /// case-sensitive matching only.
    pub fn resolve(&self, configured: &[String]) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for name in configured {
            match self.registry.get(name) {
                Some(tool) => tools.push(tool),
                None => {
                    log::debug!("[RESOLVER] Dropping unresolvable tool name '{}'", name);
                }
            }
        }

        if tools.is_empty() {
            match self.registry.get(FALLBACK_TOOL_NAME) {
                Some(fallback) => {
                    log::info!(
                        "[RESOLVER] No usable tools configured, injecting '{}'",
                        FALLBACK_TOOL_NAME
                    );
                    tools.push(fallback);
                }
                None => {
                    log::warn!(
                        "[RESOLVER] Fallback tool '{}' missing from registry",
                        FALLBACK_TOOL_NAME
                    );
                }
            }
        }

        tools
    }

    /// Resolve the tool set for a project from its persisted configuration.
    /// Names whose tool record has been deactivated are excluded before the
    /// registry intersection.
    pub fn resolve_for_project(
        &self,
        db: &Database,
        project_id: &str,
    ) -> Result<Vec<Arc<dyn Tool>>, CoreError> {
        let mut configured = Vec::new();
        for name in db.get_project_tool_names(project_id)? {
            match db.get_tool_by_function_name(&name)? {
                Some(record) if !record.active => {
                    log::debug!("[RESOLVER] Skipping deactivated tool '{}'", name);
                }
                _ => configured.push(name),
            }
        }
        Ok(self.resolve(&configured))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::create_default_registry;

    fn resolver() -> ToolSetResolver {
        ToolSetResolver::new(Arc::new(create_default_registry()))
    }

    #[test]
    fn test_empty_configuration_gets_the_fallback_tool() {
        let tools = resolver().resolve(&[]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].definition().name, FALLBACK_TOOL_NAME);
    }

    #[test]
    fn test_unknown_names_are_dropped_silently() {
        let configured = vec!["calculator".to_string(), "unknown_tool".to_string()];
        let tools = resolver().resolve(&configured);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].definition().name, "calculator");
    }

    #[test]
    fn test_all_unknown_names_fall_back() {
        let configured = vec!["nope".to_string(), "also_nope".to_string()];
        let tools = resolver().resolve(&configured);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].definition().name, FALLBACK_TOOL_NAME);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let configured = vec!["Calculator".to_string()];
        let tools = resolver().resolve(&configured);
        // The miscased name does not resolve, so only the fallback remains
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].definition().name, FALLBACK_TOOL_NAME);
    }

    #[test]
    fn test_configuration_order_is_preserved() {
        let configured = vec!["get_current_datetime".to_string(), "calculator".to_string()];
        let tools = resolver().resolve(&configured);
        let names: Vec<String> = tools.iter().map(|t| t.definition().name).collect();
        assert_eq!(names, vec!["get_current_datetime", "calculator"]);
    }

    #[test]
    fn test_deactivated_tools_are_excluded_for_a_project() {
        let dir = tempfile::tempdir().unwrap();
        let db = crate::db::Database::new(dir.path().join("r.db").to_str().unwrap()).unwrap();

        let project = db.create_project("demo", "user-a").unwrap();
        db.set_project_tools(
            &project.id,
            &["calculator".to_string(), "get_current_datetime".to_string()],
        )
        .unwrap();

        let record = db
            .create_tool("Calculator", "arithmetic", "calculator", None)
            .unwrap();
        db.set_tool_active(&record.id, false).unwrap();

        let tools = resolver().resolve_for_project(&db, &project.id).unwrap();
        let names: Vec<String> = tools.iter().map(|t| t.definition().name).collect();
        assert_eq!(names, vec!["get_current_datetime"]);
    }
}

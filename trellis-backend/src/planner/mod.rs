//! Plan generation - turning free-text tasks into ordered, tagged steps

pub mod decomposer;

pub use decomposer::{Decomposition, TaskDecomposer};

use crate::ai::AiClient;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What a plan step needs before it can run autonomously
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// The step can run without any user-supplied data
    NoAction,
    /// The step needs real-world text input from the user
    InputText,
    /// The step needs media input (image, audio, video) from the user
    InputMedia,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// What this step should accomplish
    pub task: String,
    pub action: StepAction,
    /// Human-readable description of the input the step is waiting on.
    /// Empty for steps that need nothing.
    #[serde(default)]
    pub action_description: String,
}

/// Ordered decomposition of a task. Ephemeral - plans are never persisted,
/// only the sub-tasks derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

const PLANNER_SYSTEM_PROMPT: &str = "\
For the given objective, create a clear, step-by-step plan with the following requirements:

Each step should outline a specific task that contributes to achieving the final answer.
Avoid unnecessary or redundant steps.
Ensure that each step includes all necessary information to be independently actionable.
The result of the final step should directly provide the solution.

Tag every step with exactly one action:

- `no_action`: the step needs no data from the user and can run autonomously.
- `input_text`: the step cannot proceed without real-world text input from the user \
(an address, a document, a decision). Describe the needed input in action_description.
- `input_media`: the step cannot proceed without media input from the user \
(an image, audio, or video file). Describe the needed input in action_description.

When a step needs no input, leave action_description empty.";

/// Generates a Plan from task text with one structured-output model call.
///
/// Runs at temperature zero for repeatability. There are no automatic
/// retries: a malformed structured response surfaces as a planning failure
/// for the caller to handle.
pub struct PlanGenerator {
    client: AiClient,
}

impl PlanGenerator {
    pub fn new(client: AiClient) -> Self {
        Self { client }
    }

    pub async fn generate(&self, task: &str) -> Result<Plan, CoreError> {
        if task.trim().is_empty() {
            return Err(CoreError::Planning("task text is empty".to_string()));
        }

        log::info!("[PLANNER] Generating plan for task ({} chars)", task.len());

        let value = self
            .client
            .generate_structured(PLANNER_SYSTEM_PROMPT, task, "plan", &plan_schema())
            .await
            .map_err(CoreError::Planning)?;

        let plan = parse_plan(value).map_err(CoreError::Planning)?;

        log::info!("[PLANNER] Plan has {} steps", plan.steps.len());
        Ok(plan)
    }
}

/// JSON schema the structured planning call must conform to
fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "description": "Steps to follow, in execution order",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": {
                            "type": "string",
                            "description": "Task definition"
                        },
                        "action": {
                            "type": "string",
                            "enum": ["no_action", "input_text", "input_media"],
                            "description": "The action required for this step"
                        },
                        "action_description": {
                            "type": "string",
                            "description": "What input the step is waiting on, if any"
                        }
                    },
                    "required": ["task", "action", "action_description"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["steps"],
        "additionalProperties": false
    })
}

/// Validate a structured response against the plan shape.
///
/// A plan with zero steps is treated as malformed output rather than a
/// trivially decomposable plan.
fn parse_plan(value: Value) -> Result<Plan, String> {
    let plan: Plan = serde_json::from_value(value)
        .map_err(|e| format!("structured output does not match the plan schema: {}", e))?;

    if plan.steps.is_empty() {
        return Err("plan contained no steps".to_string());
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_accepts_conforming_output() {
        let value = json!({
            "steps": [
                {"task": "Look up the current ETH price", "action": "no_action", "action_description": ""},
                {"task": "Summarize the result", "action": "no_action", "action_description": ""}
            ]
        });

        let plan = parse_plan(value).unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].action, StepAction::NoAction);
    }

    #[test]
    fn test_parse_plan_rejects_missing_steps_field() {
        let err = parse_plan(json!({"stepz": []})).unwrap_err();
        assert!(err.contains("plan schema"));
    }

    #[test]
    fn test_parse_plan_rejects_unknown_action() {
        let value = json!({
            "steps": [{"task": "do it", "action": "maybe_later", "action_description": ""}]
        });
        assert!(parse_plan(value).is_err());
    }

    #[test]
    fn test_parse_plan_rejects_zero_steps() {
        let err = parse_plan(json!({"steps": []})).unwrap_err();
        assert!(err.contains("no steps"));
    }

    #[test]
    fn test_parse_plan_defaults_missing_action_description() {
        let value = json!({
            "steps": [{"task": "compute", "action": "no_action"}]
        });
        let plan = parse_plan(value).unwrap();
        assert_eq!(plan.steps[0].action_description, "");
    }
}

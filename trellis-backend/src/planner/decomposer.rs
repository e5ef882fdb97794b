//! Task decomposition - the all-or-nothing conversion of a plan into
//! persisted, ordered sub-tasks
//!
//! Sub-task ordering assumes every entry is immediately executable, so a
//! plan mixing autonomous and input-requiring steps creates nothing at all:
//! the task is parked as ACTION_REQUIRED until the user supplies the
//! missing input and the task is re-planned.

use crate::db::Database;
use crate::error::CoreError;
use crate::models::{SubTask, Task, TaskStatus};
use crate::planner::{Plan, StepAction};
use std::sync::Arc;

/// Outcome of decomposing one plan
#[derive(Debug)]
pub enum Decomposition {
    /// Every step was autonomous; one sub-task per step was persisted
    Decomposed { sub_tasks: Vec<SubTask> },
    /// At least one step needs user input; nothing was persisted
    ActionRequired { descriptions: Vec<String> },
}

impl Decomposition {
    /// Numbered prompt text for the user, one line per required input
    pub fn user_prompt(&self) -> Option<String> {
        match self {
            Decomposition::Decomposed { .. } => None,
            Decomposition::ActionRequired { descriptions } => Some(
                descriptions
                    .iter()
                    .enumerate()
                    .map(|(i, d)| format!("{}. {}", i + 1, d))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

pub struct TaskDecomposer {
    db: Arc<Database>,
}

impl TaskDecomposer {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Convert a plan into sub-tasks, or park the task as ACTION_REQUIRED.
    ///
    /// Re-decomposing an existing task first deletes any sub-tasks left from
    /// a previous plan, so the dense 1..N ordering always reflects the
    /// current plan only.
    pub fn decompose(&self, task: &Task, plan: &Plan) -> Result<Decomposition, CoreError> {
        let descriptions: Vec<String> = plan
            .steps
            .iter()
            .filter(|step| step.action != StepAction::NoAction)
            .map(|step| {
                if step.action_description.is_empty() {
                    step.task.clone()
                } else {
                    step.action_description.clone()
                }
            })
            .collect();

        if !descriptions.is_empty() {
            log::info!(
                "[DECOMPOSER] Task {} needs user input for {} of {} steps",
                task.id,
                descriptions.len(),
                plan.steps.len()
            );
            self.db.delete_sub_tasks_for_task(&task.id)?;
            self.db
                .update_task_status(&task.id, TaskStatus::ActionRequired, &task.user_id)?;
            return Ok(Decomposition::ActionRequired { descriptions });
        }

        // Stale sub-tasks from an earlier plan would corrupt the ordering
        self.db.delete_sub_tasks_for_task(&task.id)?;

        let mut sub_tasks = Vec::with_capacity(plan.steps.len());
        for (index, step) in plan.steps.iter().enumerate() {
            let sub_task = self.db.create_sub_task(
                &task.id,
                &task.project_id,
                &task.user_id,
                &step.task,
                (index + 1) as i64,
                None,
            )?;
            sub_tasks.push(sub_task);
        }

        // A re-planned task may be coming back from ACTION_REQUIRED
        if task.status != TaskStatus::Init {
            self.db
                .update_task_status(&task.id, TaskStatus::Init, &task.user_id)?;
        }

        log::info!(
            "[DECOMPOSER] Task {} decomposed into {} sub-tasks",
            task.id,
            sub_tasks.len()
        );
        Ok(Decomposition::Decomposed { sub_tasks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanStep;

    fn test_db() -> (tempfile::TempDir, Arc<Database>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("d.db").to_str().unwrap()).unwrap();
        (dir, Arc::new(db))
    }

    fn autonomous_step(text: &str) -> PlanStep {
        PlanStep {
            task: text.to_string(),
            action: StepAction::NoAction,
            action_description: String::new(),
        }
    }

    fn input_step(text: &str, description: &str) -> PlanStep {
        PlanStep {
            task: text.to_string(),
            action: StepAction::InputText,
            action_description: description.to_string(),
        }
    }

    #[test]
    fn test_fully_autonomous_plan_creates_ordered_sub_tasks() {
        let (_dir, db) = test_db();
        let task = db.create_task("proj-1", "user-a", "price check").unwrap();
        let decomposer = TaskDecomposer::new(db.clone());

        let plan = Plan {
            steps: vec![
                autonomous_step("fetch the price"),
                autonomous_step("convert to USD"),
                autonomous_step("format the answer"),
            ],
        };

        let outcome = decomposer.decompose(&task, &plan).unwrap();
        let Decomposition::Decomposed { sub_tasks } = outcome else {
            panic!("expected full decomposition");
        };

        assert_eq!(sub_tasks.len(), 3);
        assert_eq!(
            sub_tasks.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(sub_tasks.iter().all(|s| s.status == TaskStatus::Init));

        // Task itself stays ready for execution
        let reloaded = db.get_task(&task.id, "user-a").unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Init);
    }

    #[test]
    fn test_single_step_plan_creates_one_sub_task() {
        let (_dir, db) = test_db();
        let task = db
            .create_task("proj-1", "user-a", "What's the current ETH price?")
            .unwrap();
        let decomposer = TaskDecomposer::new(db.clone());

        let plan = Plan {
            steps: vec![autonomous_step("look up the current ETH price")],
        };

        let outcome = decomposer.decompose(&task, &plan).unwrap();
        let Decomposition::Decomposed { sub_tasks } = outcome else {
            panic!("expected full decomposition");
        };
        assert_eq!(sub_tasks.len(), 1);
        assert_eq!(sub_tasks[0].order, 1);
    }

    #[test]
    fn test_any_input_step_parks_the_task_with_zero_sub_tasks() {
        let (_dir, db) = test_db();
        let task = db
            .create_task("proj-1", "user-a", "Summarize this video")
            .unwrap();
        let decomposer = TaskDecomposer::new(db.clone());

        let plan = Plan {
            steps: vec![
                autonomous_step("prepare a summary template"),
                PlanStep {
                    task: "transcribe the video".to_string(),
                    action: StepAction::InputMedia,
                    action_description: "Upload the video to summarize".to_string(),
                },
                input_step("confirm the tone", "Preferred summary tone"),
            ],
        };

        let outcome = decomposer.decompose(&task, &plan).unwrap();
        let Decomposition::ActionRequired { descriptions } = &outcome else {
            panic!("expected action required");
        };

        // One description per input-requiring step, none for autonomous ones
        assert_eq!(descriptions.len(), 2);
        assert_eq!(
            outcome.user_prompt().unwrap(),
            "1. Upload the video to summarize\n2. Preferred summary tone"
        );

        assert!(db.list_sub_tasks(&task.id, "user-a").unwrap().is_empty());
        let reloaded = db.get_task(&task.id, "user-a").unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::ActionRequired);
    }

    #[test]
    fn test_replanning_replaces_stale_sub_tasks() {
        let (_dir, db) = test_db();
        let task = db.create_task("proj-1", "user-a", "first version").unwrap();
        let decomposer = TaskDecomposer::new(db.clone());

        let first = Plan {
            steps: vec![autonomous_step("old step 1"), autonomous_step("old step 2")],
        };
        decomposer.decompose(&task, &first).unwrap();

        let second = Plan {
            steps: vec![
                autonomous_step("new step 1"),
                autonomous_step("new step 2"),
                autonomous_step("new step 3"),
            ],
        };
        decomposer.decompose(&task, &second).unwrap();

        let subs = db.list_sub_tasks(&task.id, "user-a").unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(
            subs.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(subs.iter().all(|s| s.task.starts_with("new step")));
    }

    #[test]
    fn test_replanning_out_of_action_required_resets_status() {
        let (_dir, db) = test_db();
        let task = db.create_task("proj-1", "user-a", "needs input").unwrap();
        let decomposer = TaskDecomposer::new(db.clone());

        let blocked = Plan {
            steps: vec![input_step("get address", "Your shipping address")],
        };
        decomposer.decompose(&task, &blocked).unwrap();

        let parked = db.get_task(&task.id, "user-a").unwrap().unwrap();
        assert_eq!(parked.status, TaskStatus::ActionRequired);

        let unblocked = Plan {
            steps: vec![autonomous_step("ship to the provided address")],
        };
        decomposer.decompose(&parked, &unblocked).unwrap();

        let reloaded = db.get_task(&task.id, "user-a").unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Init);
        assert_eq!(db.list_sub_tasks(&task.id, "user-a").unwrap().len(), 1);
    }
}

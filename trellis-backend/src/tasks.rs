//! Task service - submission, planning, decomposition, re-planning

use crate::ai::AiClient;
use crate::db::Database;
use crate::error::CoreError;
use crate::models::{SubTask, Task};
use crate::planner::{Decomposition, PlanGenerator, TaskDecomposer};
use std::sync::Arc;

/// Result of submitting or re-planning a task
#[derive(Debug)]
pub struct TaskCreated {
    pub task: Task,
    pub decomposition: Decomposition,
}

pub struct TaskService {
    db: Arc<Database>,
    planner: PlanGenerator,
    decomposer: TaskDecomposer,
}

impl TaskService {
    pub fn new(db: Arc<Database>, client: AiClient) -> Self {
        let planner = PlanGenerator::new(client);
        let decomposer = TaskDecomposer::new(db.clone());
        Self {
            db,
            planner,
            decomposer,
        }
    }

    /// Create a task, generate its plan, and decompose it.
    ///
    /// The task row is persisted before planning, so a planning failure
    /// leaves an INIT task with no sub-tasks behind for a later retry by
    /// the caller.
    pub async fn create_task(
        &self,
        project_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<TaskCreated, CoreError> {
        if self.db.get_project(project_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("project"));
        }

        let task = self.db.create_task(project_id, user_id, text)?;
        log::info!("[TASKS] Created task {} in project {}", task.id, project_id);

        let plan = self.planner.generate(text).await?;
        let decomposition = self.decomposer.decompose(&task, &plan)?;

        // The decomposer may have updated the status
        let task = self
            .db
            .get_task(&task.id, user_id)?
            .ok_or(CoreError::NotFound("task"))?;

        Ok(TaskCreated {
            task,
            decomposition,
        })
    }

    /// Re-plan an existing task with new text. Sub-tasks from the previous
    /// plan are replaced wholesale by the decomposer.
    pub async fn replan_task(
        &self,
        task_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<TaskCreated, CoreError> {
        let task = self
            .db
            .get_task(task_id, user_id)?
            .ok_or(CoreError::NotFound("task"))?;

        self.db.update_task_text(&task.id, text, user_id)?;
        log::info!("[TASKS] Re-planning task {}", task.id);

        let plan = self.planner.generate(text).await?;
        let task = Task {
            task: text.to_string(),
            ..task
        };
        let decomposition = self.decomposer.decompose(&task, &plan)?;

        let task = self
            .db
            .get_task(task_id, user_id)?
            .ok_or(CoreError::NotFound("task"))?;

        Ok(TaskCreated {
            task,
            decomposition,
        })
    }

    pub fn get_task(&self, task_id: &str, user_id: &str) -> Result<Task, CoreError> {
        self.db
            .get_task(task_id, user_id)?
            .ok_or(CoreError::NotFound("task"))
    }

    pub fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, CoreError> {
        Ok(self.db.list_tasks(user_id)?)
    }

    /// Sub-tasks of a task in execution order
    pub fn list_sub_tasks(&self, task_id: &str, user_id: &str) -> Result<Vec<SubTask>, CoreError> {
        if self.db.get_task(task_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("task"));
        }
        Ok(self.db.list_sub_tasks(task_id, user_id)?)
    }

    pub fn delete_task(&self, task_id: &str, user_id: &str) -> Result<(), CoreError> {
        if self.db.get_task(task_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("task"));
        }
        self.db.delete_task(task_id, user_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn service() -> (tempfile::TempDir, TaskService, Arc<Database>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("t.db").to_str().unwrap()).unwrap());
        let config = Config {
            backend: "openai".to_string(),
            endpoint: Some("http://localhost:1/unreachable".to_string()),
            api_key: String::new(),
            model: None,
            max_tokens: 128,
            database_url: String::new(),
        };
        let client = AiClient::from_config(&config).unwrap();
        let service = TaskService::new(db.clone(), client);
        (dir, service, db)
    }

    #[tokio::test]
    async fn test_create_task_requires_an_owned_project() {
        let (_dir, service, _db) = service();
        let err = service
            .create_task("missing-project", "user-a", "do something")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("project")));
    }

    #[tokio::test]
    async fn test_replan_of_unknown_task_is_not_found() {
        let (_dir, service, _db) = service();
        let err = service
            .replan_task("missing-task", "user-a", "new text")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("task")));
    }

    #[tokio::test]
    async fn test_sub_task_listing_is_owner_scoped() {
        let (_dir, service, db) = service();
        let project = db.create_project("demo", "user-a").unwrap();
        let task = db.create_task(&project.id, "user-a", "something").unwrap();

        let err = service.list_sub_tasks(&task.id, "user-b").unwrap_err();
        assert!(matches!(err, CoreError::NotFound("task")));
        assert!(service.list_sub_tasks(&task.id, "user-a").unwrap().is_empty());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by tasks and sub-tasks.
///
/// Decomposition only ever sets `Init` or `ActionRequired`; the remaining
/// transitions belong to the execution machinery downstream of this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Init,
    Started,
    ActionRequired,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Init
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Init => "init",
            TaskStatus::Started => "started",
            TaskStatus::ActionRequired => "action_required",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<TaskStatus> {
        match s {
            "init" => Some(TaskStatus::Init),
            "started" => Some(TaskStatus::Started),
            "action_required" => Some(TaskStatus::ActionRequired),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-submitted task awaiting (or past) decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub task: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One autonomous step of a fully decomposed task.
///
/// For a given task the `order` values form a dense 1-based sequence that
/// mirrors the plan-step order. Sub-tasks exist only for tasks that were
/// fully decomposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub task_id: String,
    pub project_id: String,
    pub user_id: String,
    pub task: String,
    pub status: TaskStatus,
    pub priority: Option<i64>,
    pub order: i64,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

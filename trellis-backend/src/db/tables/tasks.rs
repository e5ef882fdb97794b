//! Task and sub-task database operations

use chrono::{DateTime, Utc};
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{SubTask, Task, TaskStatus};

impl Database {
    /// Create a new task in INIT status
    pub fn create_task(&self, project_id: &str, user_id: &str, task: &str) -> SqliteResult<Task> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO tasks (id, project_id, user_id, task, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                &id,
                project_id,
                user_id,
                task,
                TaskStatus::Init.as_str(),
                &now_str
            ],
        )?;

        Ok(Task {
            id,
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            task: task.to_string(),
            status: TaskStatus::Init,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a task by ID, scoped to its owner
    pub fn get_task(&self, id: &str, user_id: &str) -> SqliteResult<Option<Task>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, project_id, user_id, task, status, created_at, updated_at
             FROM tasks WHERE id = ?1 AND user_id = ?2",
        )?;

        let task = stmt
            .query_row([id, user_id], |row| Self::row_to_task(row))
            .ok();

        Ok(task)
    }

    /// List all tasks owned by a user, newest first
    pub fn list_tasks(&self, user_id: &str) -> SqliteResult<Vec<Task>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, project_id, user_id, task, status, created_at, updated_at
             FROM tasks WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let tasks = stmt
            .query_map([user_id], |row| Self::row_to_task(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(tasks)
    }

    pub fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        user_id: &str,
    ) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            rusqlite::params![status.as_str(), &now, id, user_id],
        )?;
        Ok(())
    }

    pub fn update_task_text(&self, id: &str, task: &str, user_id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET task = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            rusqlite::params![task, &now, id, user_id],
        )?;
        Ok(())
    }

    /// Delete a task and its sub-tasks
    pub fn delete_task(&self, id: &str, user_id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM sub_tasks WHERE task_id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )?;
        conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )?;
        Ok(())
    }

    /// Create a sub-task at the given 1-based position
    pub fn create_sub_task(
        &self,
        task_id: &str,
        project_id: &str,
        user_id: &str,
        task: &str,
        order: i64,
        priority: Option<i64>,
    ) -> SqliteResult<SubTask> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO sub_tasks (id, task_id, project_id, user_id, task, status, priority,
             sort_order, response, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?9)",
            rusqlite::params![
                &id,
                task_id,
                project_id,
                user_id,
                task,
                TaskStatus::Init.as_str(),
                priority,
                order,
                &now_str
            ],
        )?;

        Ok(SubTask {
            id,
            task_id: task_id.to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            task: task.to_string(),
            status: TaskStatus::Init,
            priority,
            order,
            response: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// List a task's sub-tasks in execution order
    pub fn list_sub_tasks(&self, task_id: &str, user_id: &str) -> SqliteResult<Vec<SubTask>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, task_id, project_id, user_id, task, status, priority, sort_order,
             response, created_at, updated_at
             FROM sub_tasks WHERE task_id = ?1 AND user_id = ?2 ORDER BY sort_order ASC",
        )?;

        let sub_tasks = stmt
            .query_map([task_id, user_id], |row| Self::row_to_sub_task(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sub_tasks)
    }

    /// Delete all sub-tasks belonging to a task. Returns the number removed.
    pub fn delete_sub_tasks_for_task(&self, task_id: &str) -> SqliteResult<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM sub_tasks WHERE task_id = ?1",
            rusqlite::params![task_id],
        )
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let status_str: String = row.get(4)?;
        let created_at_str: String = row.get(5)?;
        let updated_at_str: String = row.get(6)?;

        Ok(Task {
            id: row.get(0)?,
            project_id: row.get(1)?,
            user_id: row.get(2)?,
            task: row.get(3)?,
            status: TaskStatus::from_str(&status_str).unwrap_or_default(),
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    fn row_to_sub_task(row: &rusqlite::Row) -> rusqlite::Result<SubTask> {
        let status_str: String = row.get(5)?;
        let created_at_str: String = row.get(9)?;
        let updated_at_str: String = row.get(10)?;

        Ok(SubTask {
            id: row.get(0)?,
            task_id: row.get(1)?,
            project_id: row.get(2)?,
            user_id: row.get(3)?,
            task: row.get(4)?,
            status: TaskStatus::from_str(&status_str).unwrap_or_default(),
            priority: row.get(6)?,
            order: row.get(7)?,
            response: row.get(8)?,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }

    pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_task_crud_is_owner_scoped() {
        let (_dir, db) = test_db();

        let task = db.create_task("proj-1", "user-a", "check the weather").unwrap();
        assert_eq!(task.status, TaskStatus::Init);

        assert!(db.get_task(&task.id, "user-a").unwrap().is_some());
        assert!(db.get_task(&task.id, "user-b").unwrap().is_none());

        db.update_task_status(&task.id, TaskStatus::ActionRequired, "user-a")
            .unwrap();
        let reloaded = db.get_task(&task.id, "user-a").unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::ActionRequired);
    }

    #[test]
    fn test_sub_tasks_come_back_in_order() {
        let (_dir, db) = test_db();

        let task = db.create_task("proj-1", "user-a", "multi step").unwrap();
        db.create_sub_task(&task.id, "proj-1", "user-a", "step two", 2, None)
            .unwrap();
        db.create_sub_task(&task.id, "proj-1", "user-a", "step one", 1, None)
            .unwrap();
        db.create_sub_task(&task.id, "proj-1", "user-a", "step three", 3, None)
            .unwrap();

        let subs = db.list_sub_tasks(&task.id, "user-a").unwrap();
        assert_eq!(subs.len(), 3);
        assert_eq!(
            subs.iter().map(|s| s.order).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(subs[0].task, "step one");

        let removed = db.delete_sub_tasks_for_task(&task.id).unwrap();
        assert_eq!(removed, 3);
        assert!(db.list_sub_tasks(&task.id, "user-a").unwrap().is_empty());
    }
}

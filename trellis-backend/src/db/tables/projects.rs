//! Project database operations, including the per-project tool-name list

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::Project;

impl Database {
    pub fn create_project(&self, name: &str, user_id: &str) -> SqliteResult<Project> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (id, name, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![&id, name, user_id, &now.to_rfc3339()],
        )?;

        Ok(Project {
            id,
            name: name.to_string(),
            user_id: user_id.to_string(),
            created_at: now,
        })
    }

    pub fn get_project(&self, id: &str, user_id: &str) -> SqliteResult<Option<Project>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, user_id, created_at FROM projects WHERE id = ?1 AND user_id = ?2",
        )?;

        let project = stmt
            .query_row([id, user_id], |row| {
                let created_at_str: String = row.get(3)?;
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    user_id: row.get(2)?,
                    created_at: Self::parse_timestamp(&created_at_str),
                })
            })
            .ok();

        Ok(project)
    }

    pub fn list_projects(&self, user_id: &str) -> SqliteResult<Vec<Project>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, user_id, created_at FROM projects
             WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let projects = stmt
            .query_map([user_id], |row| {
                let created_at_str: String = row.get(3)?;
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    user_id: row.get(2)?,
                    created_at: Self::parse_timestamp(&created_at_str),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(projects)
    }

    /// Replace the project's configured tool list with the given names,
    /// preserving their order
    pub fn set_project_tools(&self, project_id: &str, function_names: &[String]) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM project_tools WHERE project_id = ?1",
            rusqlite::params![project_id],
        )?;

        for name in function_names {
            conn.execute(
                "INSERT OR IGNORE INTO project_tools (project_id, function_name) VALUES (?1, ?2)",
                rusqlite::params![project_id, name],
            )?;
        }

        Ok(())
    }

    /// Configured tool names for a project, in configuration order
    pub fn get_project_tool_names(&self, project_id: &str) -> SqliteResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT function_name FROM project_tools WHERE project_id = ?1 ORDER BY id ASC",
        )?;

        let names = stmt
            .query_map([project_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_tools_preserve_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("p.db").to_str().unwrap()).unwrap();

        let project = db.create_project("demo", "user-a").unwrap();
        db.set_project_tools(
            &project.id,
            &[
                "get_weather".to_string(),
                "get_asset_price".to_string(),
                "calculator".to_string(),
            ],
        )
        .unwrap();

        let names = db.get_project_tool_names(&project.id).unwrap();
        assert_eq!(names, vec!["get_weather", "get_asset_price", "calculator"]);

        // Replacing the list drops the old entries entirely
        db.set_project_tools(&project.id, &["calculator".to_string()])
            .unwrap();
        assert_eq!(db.get_project_tool_names(&project.id).unwrap(), vec!["calculator"]);
    }
}

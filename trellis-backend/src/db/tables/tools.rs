//! Tool configuration database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::ToolRecord;

impl Database {
    pub fn create_tool(
        &self,
        name: &str,
        description: &str,
        function_name: &str,
        api_key: Option<&str>,
    ) -> SqliteResult<ToolRecord> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            "INSERT INTO tools (id, name, description, function_name, api_key, active,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            rusqlite::params![&id, name, description, function_name, api_key, &now_str],
        )?;

        Ok(ToolRecord {
            id,
            name: name.to_string(),
            description: description.to_string(),
            function_name: function_name.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_tool_by_function_name(
        &self,
        function_name: &str,
    ) -> SqliteResult<Option<ToolRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, description, function_name, api_key, active, created_at, updated_at
             FROM tools WHERE function_name = ?1",
        )?;

        let tool = stmt
            .query_row([function_name], |row| Self::row_to_tool(row))
            .ok();

        Ok(tool)
    }

    pub fn list_tools(&self) -> SqliteResult<Vec<ToolRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, description, function_name, api_key, active, created_at, updated_at
             FROM tools ORDER BY name ASC",
        )?;

        let tools = stmt
            .query_map([], |row| Self::row_to_tool(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(tools)
    }

    pub fn set_tool_active(&self, id: &str, active: bool) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tools SET active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![active as i32, &now, id],
        )?;
        Ok(())
    }

    pub fn delete_tool(&self, id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM tools WHERE id = ?1", rusqlite::params![id])?;
        Ok(())
    }

    fn row_to_tool(row: &rusqlite::Row) -> rusqlite::Result<ToolRecord> {
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        Ok(ToolRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            function_name: row.get(3)?,
            api_key: row.get(4)?,
            active: row.get::<_, i32>(5)? != 0,
            created_at: Self::parse_timestamp(&created_at_str),
            updated_at: Self::parse_timestamp(&updated_at_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("tools.db").to_str().unwrap()).unwrap();

        let record = db
            .create_tool("Weather", "Current conditions", "get_weather", Some("key-123"))
            .unwrap();
        assert!(record.active);

        let loaded = db.get_tool_by_function_name("get_weather").unwrap().unwrap();
        assert_eq!(loaded.id, record.id);
        assert_eq!(loaded.api_key.as_deref(), Some("key-123"));

        db.set_tool_active(&record.id, false).unwrap();
        let loaded = db.get_tool_by_function_name("get_weather").unwrap().unwrap();
        assert!(!loaded.active);

        assert_eq!(db.list_tools().unwrap().len(), 1);
        db.delete_tool(&record.id).unwrap();
        assert!(db.get_tool_by_function_name("get_weather").unwrap().is_none());
    }

    #[test]
    fn test_function_name_is_unique() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("tools.db").to_str().unwrap()).unwrap();

        db.create_tool("First", "first", "dupe", None).unwrap();
        assert!(db.create_tool("Second", "second", "dupe", None).is_err());
    }
}

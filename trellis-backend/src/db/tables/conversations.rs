//! Conversation and message-log database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::models::{Conversation, MemoryRecord, MemoryRole};

impl Database {
    pub fn create_conversation(
        &self,
        name: &str,
        project_id: &str,
        user_id: &str,
    ) -> SqliteResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (id, name, project_id, user_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![&id, name, project_id, user_id, &now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id,
            name: name.to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            created_at: now,
        })
    }

    pub fn get_conversation(&self, id: &str, user_id: &str) -> SqliteResult<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, project_id, user_id, created_at
             FROM conversations WHERE id = ?1 AND user_id = ?2",
        )?;

        let conversation = stmt
            .query_row([id, user_id], |row| Self::row_to_conversation(row))
            .ok();

        Ok(conversation)
    }

    pub fn list_conversations(&self, project_id: &str) -> SqliteResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, project_id, user_id, created_at
             FROM conversations WHERE project_id = ?1 ORDER BY created_at DESC",
        )?;

        let conversations = stmt
            .query_map([project_id], |row| Self::row_to_conversation(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(conversations)
    }

    /// Delete a conversation and its message log
    pub fn delete_conversation(&self, id: &str, user_id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
        )?;
        if deleted > 0 {
            conn.execute(
                "DELETE FROM conversation_messages WHERE conversation_id = ?1",
                rusqlite::params![id],
            )?;
        }
        Ok(())
    }

    /// Project a conversation belongs to, regardless of owner
    pub fn project_for_conversation(&self, conversation_id: &str) -> SqliteResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let project_id = conn
            .query_row(
                "SELECT project_id FROM conversations WHERE id = ?1",
                [conversation_id],
                |row| row.get(0),
            )
            .ok();
        Ok(project_id)
    }

    /// Append one message to a conversation's log
    pub fn append_conversation_message(
        &self,
        conversation_id: &str,
        role: MemoryRole,
        content: &str,
    ) -> SqliteResult<MemoryRecord> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversation_messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![conversation_id, role.as_str(), content, &now.to_rfc3339()],
        )?;

        Ok(MemoryRecord {
            id: conn.last_insert_rowid(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Full ordered message log for a conversation
    pub fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> SqliteResult<Vec<MemoryRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at
             FROM conversation_messages WHERE conversation_id = ?1 ORDER BY id ASC",
        )?;

        let messages = stmt
            .query_map([conversation_id], |row| {
                let role_str: String = row.get(2)?;
                let created_at_str: String = row.get(4)?;
                Ok(MemoryRecord {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: MemoryRole::from_str(&role_str).unwrap_or(MemoryRole::Human),
                    content: row.get(3)?,
                    created_at: Self::parse_timestamp(&created_at_str),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(messages)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
        let created_at_str: String = row.get(4)?;
        Ok(Conversation {
            id: row.get(0)?,
            name: row.get(1)?,
            project_id: row.get(2)?,
            user_id: row.get(3)?,
            created_at: Self::parse_timestamp(&created_at_str),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_log_keeps_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("c.db").to_str().unwrap()).unwrap();

        let project = db.create_project("demo", "user-a").unwrap();
        let conv = db
            .create_conversation("chat", &project.id, "user-a")
            .unwrap();

        db.append_conversation_message(&conv.id, MemoryRole::Human, "hello")
            .unwrap();
        db.append_conversation_message(&conv.id, MemoryRole::Ai, "hi there")
            .unwrap();
        db.append_conversation_message(&conv.id, MemoryRole::Human, "what now?")
            .unwrap();

        let log = db.get_conversation_messages(&conv.id).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].role, MemoryRole::Human);
        assert_eq!(log[1].role, MemoryRole::Ai);
        assert_eq!(log[2].content, "what now?");

        assert_eq!(
            db.project_for_conversation(&conv.id).unwrap().as_deref(),
            Some(project.id.as_str())
        );
    }
}

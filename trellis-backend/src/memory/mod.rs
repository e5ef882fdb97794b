//! Durable per-conversation memory gateway
//!
//! The engine only ever appends turns and reads the full ordered log.
//! Concurrent writers to the same conversation are not synchronized here;
//! their interleaving is whatever the store produces.

use crate::db::Database;
use crate::error::CoreError;
use crate::models::{MemoryRecord, MemoryRole};
use std::sync::Arc;

pub trait ConversationMemory: Send + Sync {
    /// Full message log for a conversation, in append order
    fn read_all(&self, conversation_id: &str) -> Result<Vec<MemoryRecord>, CoreError>;

    /// Append one turn to the end of a conversation's log
    fn append(
        &self,
        conversation_id: &str,
        role: MemoryRole,
        content: &str,
    ) -> Result<(), CoreError>;
}

/// Memory gateway over the relational store
pub struct SqliteMemory {
    db: Arc<Database>,
}

impl SqliteMemory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ConversationMemory for SqliteMemory {
    fn read_all(&self, conversation_id: &str) -> Result<Vec<MemoryRecord>, CoreError> {
        Ok(self.db.get_conversation_messages(conversation_id)?)
    }

    fn append(
        &self,
        conversation_id: &str,
        role: MemoryRole,
        content: &str,
    ) -> Result<(), CoreError> {
        self.db
            .append_conversation_message(conversation_id, role, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_read_preserves_order_and_roles() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("m.db").to_str().unwrap()).unwrap());
        let memory = SqliteMemory::new(db);

        memory.append("conv-1", MemoryRole::Human, "first").unwrap();
        memory.append("conv-1", MemoryRole::Ai, "second").unwrap();
        memory.append("conv-2", MemoryRole::Human, "other").unwrap();

        let log = memory.read_all("conv-1").unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, MemoryRole::Human);
        assert_eq!(log[0].content, "first");
        assert_eq!(log[1].role, MemoryRole::Ai);

        assert_eq!(memory.read_all("conv-2").unwrap().len(), 1);
        assert!(memory.read_all("conv-3").unwrap().is_empty());
    }
}

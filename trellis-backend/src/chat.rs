//! Conversation service - agent invocation with per-project tool scoping
//!
//! A message resolves through: conversation → owning project → configured
//! tool names → registry intersection → execution engine with durable
//! memory. Results come back either as one complete reply with the tool
//! trace, or as a live event stream.

use crate::ai::AiClient;
use crate::db::Database;
use crate::engine::{AgentExecutionEngine, EventStream, IntermediateStep};
use crate::error::CoreError;
use crate::memory::{ConversationMemory, SqliteMemory};
use crate::models::{Conversation, MemoryRecord};
use crate::tools::{ToolContext, ToolRegistry, ToolSetResolver};
use serde::Serialize;
use std::sync::Arc;

/// Complete reply from a non-streaming invocation
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub intermediate_steps: Vec<IntermediateStep>,
}

pub struct ConversationService {
    db: Arc<Database>,
    resolver: ToolSetResolver,
    client: AiClient,
    memory: Arc<dyn ConversationMemory>,
}

impl ConversationService {
    pub fn new(db: Arc<Database>, registry: Arc<ToolRegistry>, client: AiClient) -> Self {
        let memory: Arc<dyn ConversationMemory> = Arc::new(SqliteMemory::new(db.clone()));
        Self {
            db,
            resolver: ToolSetResolver::new(registry),
            client,
            memory,
        }
    }

    pub fn create_conversation(
        &self,
        name: &str,
        project_id: &str,
        user_id: &str,
    ) -> Result<Conversation, CoreError> {
        if self.db.get_project(project_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("project"));
        }
        Ok(self.db.create_conversation(name, project_id, user_id)?)
    }

    pub fn get_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Conversation, CoreError> {
        self.db
            .get_conversation(conversation_id, user_id)?
            .ok_or(CoreError::NotFound("conversation"))
    }

    pub fn list_conversations(&self, project_id: &str) -> Result<Vec<Conversation>, CoreError> {
        Ok(self.db.list_conversations(project_id)?)
    }

    pub fn delete_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<(), CoreError> {
        if self.db.get_conversation(conversation_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("conversation"));
        }
        self.db.delete_conversation(conversation_id, user_id)?;
        Ok(())
    }

    /// Ordered role-tagged message log for a conversation
    pub fn history(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Vec<MemoryRecord>, CoreError> {
        if self.db.get_conversation(conversation_id, user_id)?.is_none() {
            return Err(CoreError::NotFound("conversation"));
        }
        self.memory.read_all(conversation_id)
    }

    /// Send a message and wait for the complete reply plus tool trace
    pub async fn send_message(
        &self,
        conversation_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<ChatReply, CoreError> {
        let engine = self.build_engine(conversation_id, user_id)?;
        let outcome = engine.ask(message).await?;

        Ok(ChatReply {
            response: outcome.output,
            intermediate_steps: outcome.intermediate_steps,
        })
    }

    /// Send a message and consume the reply as a live event stream
    pub fn send_message_streaming(
        &self,
        conversation_id: &str,
        user_id: &str,
        message: &str,
    ) -> Result<EventStream, CoreError> {
        let engine = self.build_engine(conversation_id, user_id)?;
        Ok(engine.stream(message))
    }

    /// Resolve a conversation into a ready-to-run engine
    fn build_engine(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<AgentExecutionEngine, CoreError> {
        let conversation = self
            .db
            .get_conversation(conversation_id, user_id)?
            .ok_or(CoreError::NotFound("conversation"))?;

        let project_id = self
            .db
            .project_for_conversation(&conversation.id)?
            .ok_or(CoreError::NotFound("project"))?;

        let tools = self.resolver.resolve_for_project(&self.db, &project_id)?;
        log::info!(
            "[CHAT] Conversation {} resolved {} tool(s) from project {}",
            conversation.id,
            tools.len(),
            project_id
        );

        let mut context = ToolContext::new()
            .with_project(project_id)
            .with_conversation(conversation.id.clone())
            .with_user(user_id);

        // Hand each resolved tool its stored credential, if any
        for tool in &tools {
            let name = tool.definition().name;
            if let Some(record) = self.db.get_tool_by_function_name(&name)? {
                if let Some(key) = record.api_key {
                    context = context.with_api_key(&name, key);
                }
            }
        }

        Ok(AgentExecutionEngine::new(self.client.clone(), tools)
            .with_memory(self.memory.clone(), conversation.id)
            .with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tools::create_default_registry;

    fn service() -> (tempfile::TempDir, ConversationService, Arc<Database>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("c.db").to_str().unwrap()).unwrap());
        let config = Config {
            backend: "openai".to_string(),
            endpoint: Some("http://localhost:1/unreachable".to_string()),
            api_key: String::new(),
            model: None,
            max_tokens: 128,
            database_url: String::new(),
        };
        let client = AiClient::from_config(&config).unwrap();
        let registry = Arc::new(create_default_registry());
        let service = ConversationService::new(db.clone(), registry, client);
        (dir, service, db)
    }

    #[tokio::test]
    async fn test_send_message_to_unknown_conversation_is_not_found() {
        let (_dir, service, _db) = service();
        let err = service
            .send_message("missing", "user-a", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("conversation")));
    }

    #[test]
    fn test_conversation_crud_and_history_scoping() {
        let (_dir, service, db) = service();
        let project = db.create_project("demo", "user-a").unwrap();

        let conv = service
            .create_conversation("chat", &project.id, "user-a")
            .unwrap();
        assert_eq!(service.list_conversations(&project.id).unwrap().len(), 1);

        // Another user cannot read the history
        let err = service.history(&conv.id, "user-b").unwrap_err();
        assert!(matches!(err, CoreError::NotFound("conversation")));
        assert!(service.history(&conv.id, "user-a").unwrap().is_empty());

        service.delete_conversation(&conv.id, "user-a").unwrap();
        assert!(service.list_conversations(&project.id).unwrap().is_empty());
    }

    #[test]
    fn test_conversation_requires_owned_project() {
        let (_dir, service, _db) = service();
        let err = service
            .create_conversation("chat", "missing-project", "user-a")
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("project")));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A project scopes conversations and the tool set their agents may use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Author of a conversation memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRole {
    Human,
    Ai,
}

impl MemoryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryRole::Human => "human",
            MemoryRole::Ai => "ai",
        }
    }

    pub fn from_str(s: &str) -> Option<MemoryRole> {
        match s {
            "human" => Some(MemoryRole::Human),
            "ai" => Some(MemoryRole::Ai),
            _ => None,
        }
    }
}

/// One entry of a conversation's append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub conversation_id: String,
    pub role: MemoryRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted tool configuration row.
///
/// `function_name` is the stable identity bridge between this record and the
/// in-process registry binding of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub function_name: String,
    /// Credential handed to the handler at execution time, if the tool
    /// needs one. Stored as-is; encryption is handled upstream.
    pub api_key: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

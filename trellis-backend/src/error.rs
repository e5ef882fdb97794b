use thiserror::Error;

/// Error taxonomy for the orchestration core.
///
/// Tool-level failures never appear here: a failing or timed-out tool is
/// downgraded to a string `ToolResult` at the call boundary and flows back
/// into the agent loop as an ordinary observation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The structured planning call returned output that does not conform to
    /// the plan schema. Never retried.
    #[error("planning failed: {0}")]
    Planning(String),

    /// A referenced project, task, or conversation does not exist within the
    /// caller's ownership scope.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Transport or protocol failure talking to the model-serving backend.
    #[error("model backend error: {0}")]
    Backend(String),
}

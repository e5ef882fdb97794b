use std::env;

/// Process configuration, read once at start-up and injected into consumers.
#[derive(Clone)]
pub struct Config {
    /// Model-serving backend family ("openai" or "claude"). Determines the
    /// function-calling convention the agent loop uses.
    pub backend: String,
    /// Override for the backend endpoint URL. Empty uses the family default.
    pub endpoint: Option<String>,
    pub api_key: String,
    /// Override for the model identifier. Empty uses the family default.
    pub model: Option<String>,
    pub max_tokens: u32,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            backend: env::var("MODEL_BACKEND").unwrap_or_else(|_| "openai".to_string()),
            endpoint: env::var("MODEL_ENDPOINT").ok().filter(|s| !s.is_empty()),
            api_key: env::var("MODEL_API_KEY").unwrap_or_default(),
            model: env::var("MODEL_NAME").ok().filter(|s| !s.is_empty()),
            max_tokens: env::var("MAX_TOKENS")
                .unwrap_or_else(|_| "4096".to_string())
                .parse()
                .expect("MAX_TOKENS must be a valid number"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./.db/trellis.db".to_string()),
        }
    }
}

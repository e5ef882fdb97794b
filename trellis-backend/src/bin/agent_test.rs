//! Agent test fixture
//!
//! A minimal harness for exercising the full message path (tool resolution,
//! agent loop, event stream) against a live backend without any surrounding
//! application.
//!
//! Usage:
//!   TEST_QUERY="what time is it?" \
//!   MODEL_API_KEY="your-api-key" \
//!   cargo run --bin agent_test

use std::env;
use std::sync::Arc;

use trellis_backend::ai::AiClient;
use trellis_backend::tools::create_default_registry;
use trellis_backend::{AgentEvent, Config, ConversationService, Database};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let query = env::var("TEST_QUERY").unwrap_or_else(|_| "What is the current time?".to_string());
    let config = Config::from_env();

    let db = Arc::new(Database::new(&config.database_url).expect("Failed to initialize database"));
    let registry = Arc::new(create_default_registry());
    log::info!("Registered {} tools", registry.len());

    let client = AiClient::from_config(&config).expect("Failed to create AI client");
    let service = ConversationService::new(db.clone(), registry, client);

    // Fresh throwaway scope for each run
    let project = db.create_project("agent-test", "agent-test-user").unwrap();
    db.set_project_tools(
        &project.id,
        &["get_current_datetime".to_string(), "calculator".to_string()],
    )
    .unwrap();
    let conversation = service
        .create_conversation("agent-test", &project.id, "agent-test-user")
        .unwrap();

    println!("> {}", query);

    let mut stream = service
        .send_message_streaming(&conversation.id, "agent-test-user", &query)
        .expect("Failed to start stream");

    while let Some(event) = stream.next().await {
        match event {
            AgentEvent::Token { data } => {
                print!("{}", data);
            }
            AgentEvent::ToolStart { tool, tool_input } => {
                println!("\n[tool] {} {}", tool, tool_input);
            }
        }
    }
    println!();

    let history = service
        .history(&conversation.id, "agent-test-user")
        .unwrap();
    println!("--- {} message(s) stored ---", history.len());
}

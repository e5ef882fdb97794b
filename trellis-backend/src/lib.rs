pub mod ai;
pub mod chat;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod planner;
pub mod tasks;
pub mod tools;

pub use chat::{ChatReply, ConversationService};
pub use config::Config;
pub use db::Database;
pub use engine::{AgentEvent, AgentExecutionEngine, AgentOutcome, EventStream};
pub use error::CoreError;
pub use planner::{Decomposition, Plan, PlanGenerator, PlanStep, StepAction, TaskDecomposer};
pub use tasks::{TaskCreated, TaskService};
pub use tools::{Tool, ToolRegistry, ToolSetResolver};

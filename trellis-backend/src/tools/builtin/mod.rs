pub mod calculator;
pub mod datetime;

pub use calculator::CalculatorTool;
pub use datetime::{CurrentDatetimeTool, FALLBACK_TOOL_NAME};

pub mod claude_api;
pub mod generation;
pub mod usage_log;

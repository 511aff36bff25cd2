//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db)
//! - `chart` - Chart inspection command
//! - `llm` - LLM backend utilities
//! - `serve` - Web server command
//! - `users` - Account management commands

pub mod chart;
pub mod core;
pub mod llm;
pub mod serve;
pub mod users;

// Re-export command functions for main.rs
pub use chart::*;
pub use core::*;
pub use llm::*;
pub use serve::*;
pub use users::*;

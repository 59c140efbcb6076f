//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `setup` - Shared utilities (config loading, orchestrator setup, context parsing)
//! - `insights` - Insight, forecast, personalized and dashboard commands
//! - `notebook` - Notebook patch/rewrite commands
//! - `serve` - Web server command
//! - `sql` - Analytical SQL and title classification commands
//! - `status` - Configuration and connectivity check

pub mod insights;
pub mod notebook;
pub mod serve;
pub mod setup;
pub mod sql;
pub mod status;

// Re-export command functions for main.rs
pub use insights::*;
pub use notebook::*;
pub use serve::*;
pub use setup::*;
pub use sql::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

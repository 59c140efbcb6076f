//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analytics;
pub mod forecasts;
pub mod insights;
pub mod preferences;

// Re-export all handlers for use in router
pub use analytics::*;
pub use forecasts::*;
pub use insights::*;
pub use preferences::*;

//! Server command implementation

use std::path::Path;

use anyhow::Result;
use eki_core::KnowledgeEngine;

use super::open_orchestrator;

pub async fn cmd_serve(config_path: Option<&Path>, host: &str, port: u16) -> Result<()> {
    let orchestrator = open_orchestrator(config_path)?;
    let config = eki_server::ServerConfig::from_env();

    println!("🚀 Starting EKI API server...");
    println!(
        "   Engine: {} (project: {}, dataset: {})",
        orchestrator.engine().name(),
        orchestrator.config().project_id,
        orchestrator.config().dataset
    );
    println!("   Listening: http://{}:{}", host, port);
    if config.api_keys.is_empty() {
        println!("   ⚠️  No API keys configured: any non-empty bearer token is accepted");
        println!("      Set EKI_API_KEYS to restrict access");
    } else {
        println!(
            "   🔑 API keys: {} configured (EKI_API_KEYS)",
            config.api_keys.len()
        );
    }
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 CORS origins: {} (EKI_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }
    println!();
    println!("   Press Ctrl+C to stop");

    eki_server::serve_with_config(orchestrator, host, port, config).await
}

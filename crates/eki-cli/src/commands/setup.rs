//! Shared command utilities
//!
//! This module contains:
//! - `load_engine_config` - Resolve engine configuration
//! - `open_orchestrator` - Build the orchestrator over the configured engine
//! - `parse_context` - Parse repeated `key=value` arguments

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use eki_core::config::load_config;
use eki_core::{EngineClient, EngineConfig, InsightOrchestrator, KnowledgeEngine};
use tracing::debug;

/// Load engine config from an explicit file, or from the environment
pub fn load_engine_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            let project = std::env::var("BIGQUERY_PROJECT").unwrap_or_default();
            load_config(Some(path), &project)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => EngineConfig::from_env().context("Failed to load engine config"),
    }
}

/// Build an orchestrator from config and `EKI_ENGINE`
pub fn open_orchestrator(config_path: Option<&Path>) -> Result<InsightOrchestrator> {
    let config = load_engine_config(config_path)?;
    let engine = EngineClient::from_env(&config).context("Failed to set up knowledge engine")?;
    debug!(
        engine = engine.name(),
        project = %config.project_id,
        dataset = %config.dataset,
        "Opened knowledge engine"
    );
    Ok(InsightOrchestrator::new(engine, config))
}

/// Parse `key=value` pairs; values that are valid JSON keep their type
pub fn parse_context(pairs: &[String]) -> Result<BTreeMap<String, serde_json::Value>> {
    let mut context = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid context '{}': expected KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid context '{}': key must not be empty", pair);
        }
        let value = serde_json::from_str(value.trim())
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

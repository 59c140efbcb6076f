//! Engine configuration
//!
//! Every tunable used by the orchestrator and the engine backends lives in
//! [`EngineConfig`], which is built once at startup and passed explicitly.
//!
//! ## Configuration Resolution
//!
//! 1. Embedded defaults (`config/engine.toml`, compiled into the binary)
//! 2. Optional override file (`EKI_CONFIG`, else `~/.config/eki/engine.toml`)
//! 3. Environment: `BIGQUERY_PROJECT` (required), `EKI_DATASET` (optional)
//!
//! A missing project id is a startup error, never a request-time one.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Fixed dataset namespace used when nothing overrides it
pub const DEFAULT_DATASET: &str = "enterprise_ai";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Warehouse project that owns the dataset, tables and models
    pub project_id: String,
    /// Dataset namespace (default `enterprise_ai`)
    pub dataset: String,
    /// Number of nearest records pulled by semantic retrieval
    pub top_k: usize,
    /// Records at or below this similarity are not used as generation context
    pub similarity_threshold: f64,
    pub default_confidence_score: f64,
    pub default_business_impact_score: f64,
    pub personalization_window_days: u32,
    pub dashboard_window_hours: u32,
    pub dashboard_recent_limit: usize,
    /// Upper bound on a single engine round trip
    pub request_timeout: Duration,
    /// Extra attempts for transport failures and timeouts
    pub max_retries: u32,
    pub max_horizon_days: u32,
    pub max_personalized_limit: usize,
}

impl EngineConfig {
    /// Defaults with an explicit project id (for tests and embedding)
    pub fn with_project(project_id: &str) -> Result<Self> {
        parse_config(DEFAULT_CONFIG, project_id)
    }

    /// Load config from the override file (if any) and the environment
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("BIGQUERY_PROJECT").unwrap_or_default();
        let override_path = std::env::var("EKI_CONFIG")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = load_config(override_path.as_deref(), &project)?;
        if let Ok(dataset) = std::env::var("EKI_DATASET") {
            if !dataset.trim().is_empty() {
                config.dataset = dataset.trim().to_string();
            }
        }
        Ok(config)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eki").join("engine.toml"))
}

/// Load configuration (override first, then embedded default)
pub fn load_config(override_path: Option<&Path>, project_id: &str) -> Result<EngineConfig> {
    let content = match override_path {
        Some(path) if path.exists() => fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content, project_id)
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    engine: Option<RawEngine>,
    retrieval: Option<RawRetrieval>,
    windows: Option<RawWindows>,
    limits: Option<RawLimits>,
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    dataset: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawRetrieval {
    top_k: Option<usize>,
    similarity_threshold: Option<f64>,
    default_confidence_score: Option<f64>,
    default_business_impact_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawWindows {
    personalization_days: Option<u32>,
    dashboard_hours: Option<u32>,
    dashboard_recent_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawLimits {
    max_horizon_days: Option<u32>,
    max_personalized_limit: Option<usize>,
}

/// Parse config from TOML content
///
/// Keys missing from `content` keep their built-in values, so an override
/// file only needs the settings it changes.
pub fn parse_config(content: &str, project_id: &str) -> Result<EngineConfig> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(Error::Config(
            "BIGQUERY_PROJECT must be set to the warehouse project id".into(),
        ));
    }

    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = EngineConfig {
        project_id: project_id.to_string(),
        dataset: DEFAULT_DATASET.to_string(),
        top_k: 5,
        similarity_threshold: 0.7,
        default_confidence_score: 0.85,
        default_business_impact_score: 0.75,
        personalization_window_days: 7,
        dashboard_window_hours: 24,
        dashboard_recent_limit: 5,
        request_timeout: Duration::from_secs(30),
        max_retries: 1,
        max_horizon_days: 365,
        max_personalized_limit: 100,
    };

    if let Some(engine) = raw.engine {
        if let Some(dataset) = engine.dataset {
            config.dataset = dataset;
        }
        if let Some(secs) = engine.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = engine.max_retries {
            config.max_retries = retries;
        }
    }

    if let Some(retrieval) = raw.retrieval {
        if let Some(k) = retrieval.top_k {
            config.top_k = k;
        }
        if let Some(t) = retrieval.similarity_threshold {
            config.similarity_threshold = t;
        }
        if let Some(c) = retrieval.default_confidence_score {
            config.default_confidence_score = c;
        }
        if let Some(b) = retrieval.default_business_impact_score {
            config.default_business_impact_score = b;
        }
    }

    if let Some(windows) = raw.windows {
        if let Some(days) = windows.personalization_days {
            config.personalization_window_days = days;
        }
        if let Some(hours) = windows.dashboard_hours {
            config.dashboard_window_hours = hours;
        }
        if let Some(limit) = windows.dashboard_recent_limit {
            config.dashboard_recent_limit = limit;
        }
    }

    if let Some(limits) = raw.limits {
        if let Some(h) = limits.max_horizon_days {
            config.max_horizon_days = h;
        }
        if let Some(l) = limits.max_personalized_limit {
            config.max_personalized_limit = l;
        }
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<()> {
    if !crate::sql::is_valid_identifier(&config.dataset) {
        return Err(Error::Config(format!(
            "Invalid dataset name: {}",
            config.dataset
        )));
    }
    if config.top_k == 0 {
        return Err(Error::Config("retrieval.top_k must be at least 1".into()));
    }
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(Error::Config(
            "retrieval.similarity_threshold must be within [0, 1]".into(),
        ));
    }
    if config.request_timeout.is_zero() {
        return Err(Error::Config("engine.timeout_secs must be positive".into()));
    }
    if config.max_horizon_days == 0 || config.max_personalized_limit == 0 {
        return Err(Error::Config("limits must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_defaults() {
        let config = EngineConfig::with_project("acme-prod").unwrap();
        assert_eq!(config.project_id, "acme-prod");
        assert_eq!(config.dataset, "enterprise_ai");
        assert_eq!(config.top_k, 5);
        assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.personalization_window_days, 7);
        assert_eq!(config.dashboard_window_hours, 24);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_project_fails_fast() {
        let err = parse_config(DEFAULT_CONFIG, "  ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            "[retrieval]\nsimilarity_threshold = 0.5\n\n[engine]\ntimeout_secs = 5\n",
            "p",
        )
        .unwrap();
        assert!((config.similarity_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.top_k, 5);
        assert_eq!(config.dataset, "enterprise_ai");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config("[retrieval]\ntop_k = 0\n", "p").is_err());
        assert!(parse_config("[retrieval]\nsimilarity_threshold = 1.5\n", "p").is_err());
        assert!(parse_config("[engine]\ndataset = \"bad-name;\"\n", "p").is_err());
        assert!(parse_config("not toml [", "p").is_err());
    }

    #[test]
    fn test_load_config_from_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[windows]\npersonalization_days = 14").unwrap();

        let config = load_config(Some(file.path()), "p").unwrap();
        assert_eq!(config.personalization_window_days, 14);
    }

    #[test]
    fn test_load_config_missing_override_uses_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/engine.toml")), "p").unwrap();
        assert_eq!(config.top_k, 5);
    }
}

//! Domain models for EKI
//!
//! Request and response records exchanged with API callers, plus the row
//! shapes returned by the knowledge engine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Authenticated caller of an orchestrator operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub user_id: String,
    pub role: String,
}

impl CallerIdentity {
    pub fn new(user_id: &str, role: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: role.to_string(),
        }
    }

    /// Fixed identity assigned to any accepted bearer token
    pub fn demo() -> Self {
        Self::new("demo_user", "analyst")
    }
}

/// Natural-language insight request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRequest {
    pub query: String,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub context: Option<BTreeMap<String, serde_json::Value>>,
}

impl InsightRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            user_role: None,
            context: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if let Some(role) = &self.user_role {
            if role.trim().is_empty() {
                return Err(Error::Validation("user_role must not be blank".into()));
            }
        }
        Ok(())
    }
}

/// Generated insight
///
/// Scores are nominally within [0, 1] but are reported as the engine
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightResponse {
    pub insight_id: String,
    pub content: String,
    pub confidence_score: f64,
    pub business_impact_score: f64,
    pub generated_timestamp: DateTime<Utc>,
    pub sources: Vec<String>,
}

fn default_horizon_days() -> u32 {
    30
}

fn default_confidence_level() -> f64 {
    0.95
}

/// Forecast request for a named business metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub metric_name: String,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
}

impl ForecastRequest {
    pub fn new(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            horizon_days: default_horizon_days(),
            confidence_level: default_confidence_level(),
        }
    }

    /// Reject shapes that cannot be turned into a forecast model call
    ///
    /// The metric name becomes part of a model identifier, so only
    /// identifier characters are allowed.
    pub fn validate(&self, max_horizon_days: u32) -> Result<()> {
        if !crate::sql::is_valid_metric_name(&self.metric_name) {
            return Err(Error::Validation(format!(
                "metric_name must start with a letter and contain only letters, digits or '_' (got {:?})",
                self.metric_name
            )));
        }
        if self.horizon_days == 0 || self.horizon_days > max_horizon_days {
            return Err(Error::Validation(format!(
                "horizon_days must be between 1 and {}",
                max_horizon_days
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Validation(
                "confidence_level must be strictly between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub timestamp: DateTime<Utc>,
    pub lower: f64,
    pub upper: f64,
}

/// Forecast series with parallel interval series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub metric_name: String,
    pub forecast_values: Vec<ForecastPoint>,
    pub confidence_intervals: Vec<ConfidenceInterval>,
    pub strategic_recommendations: String,
}

/// One row of engine forecast output
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Knowledge record returned by semantic retrieval
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub knowledge_id: String,
    pub content: String,
    pub similarity: f64,
}

/// Stored insight targeted at a role, with the engine's relevance rating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedInsight {
    pub insight_id: String,
    pub content: String,
    pub confidence_score: f64,
    pub business_impact_score: f64,
    pub relevance_score: f64,
    pub generated_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizedInsights {
    pub insights: Vec<PersonalizedInsight>,
    pub total_count: usize,
}

/// Named counter on the dashboard (e.g. `total_insights`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric_name: String,
    pub metric_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentInsight {
    pub insight_id: String,
    pub content: String,
    pub business_impact_score: f64,
    pub generated_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: Vec<MetricValue>,
    pub recent_insights: Vec<RecentInsight>,
}

/// Per-user delivery preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: String,
    pub role: String,
    pub departments: BTreeSet<String>,
    pub notification_preferences: BTreeMap<String, bool>,
    pub priority_topics: BTreeSet<String>,
}

impl UserPreferences {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::Validation("user_id must not be empty".into()));
        }
        if self.role.trim().is_empty() {
            return Err(Error::Validation("role must not be empty".into()));
        }
        if self.departments.iter().any(|d| d.trim().is_empty())
            || self.priority_topics.iter().any(|t| t.trim().is_empty())
        {
            return Err(Error::Validation("tags must not be blank".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_request_defaults() {
        let req: ForecastRequest = serde_json::from_str(r#"{"metric_name": "revenue"}"#).unwrap();
        assert_eq!(req.horizon_days, 30);
        assert!((req.confidence_level - 0.95).abs() < f64::EPSILON);
        assert!(req.validate(365).is_ok());
    }

    #[test]
    fn test_forecast_request_bounds() {
        let mut req = ForecastRequest::new("revenue");
        req.horizon_days = 0;
        assert!(req.validate(365).is_err());
        req.horizon_days = 366;
        assert!(req.validate(365).is_err());
        req.horizon_days = 7;
        req.confidence_level = 1.0;
        assert!(req.validate(365).is_err());
        req.confidence_level = 0.0;
        assert!(req.validate(365).is_err());
    }

    #[test]
    fn test_forecast_request_rejects_injected_metric() {
        let req = ForecastRequest::new("revenue`; DROP TABLE x; --");
        assert!(matches!(req.validate(365), Err(Error::Validation(_))));
    }

    #[test]
    fn test_insight_request_optional_fields() {
        let req: InsightRequest =
            serde_json::from_str(r#"{"query": "revenue trends", "user_role": "executive"}"#)
                .unwrap();
        assert_eq!(req.user_role.as_deref(), Some("executive"));
        assert!(req.context.is_none());
        assert!(req.validate().is_ok());

        assert!(InsightRequest::new("   ").validate().is_err());
    }

    #[test]
    fn test_preferences_requires_identity_fields() {
        let prefs: UserPreferences = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "role": "executive",
            "departments": ["finance", "finance", "sales"],
            "notification_preferences": {"email": true, "slack": false},
            "priority_topics": ["revenue"]
        }))
        .unwrap();
        assert_eq!(prefs.departments.len(), 2);
        assert!(prefs.validate().is_ok());

        let blank = UserPreferences {
            user_id: " ".into(),
            ..prefs
        };
        assert!(blank.validate().is_err());
    }
}

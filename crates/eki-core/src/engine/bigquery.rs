//! BigQuery backend implementation
//!
//! Every capability is a single synchronous `jobs.query` call against the
//! REST API, with caller text bound as named parameters.
//!
//! # Configuration
//!
//! Environment variables:
//! - `BIGQUERY_ACCESS_TOKEN`: OAuth bearer token (required)
//! - `BIGQUERY_API_BASE`: REST endpoint (default: https://bigquery.googleapis.com/bigquery/v2)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{
    ForecastRow, MetricValue, PersonalizedInsight, RecentInsight, SearchHit, UserPreferences,
};
use crate::sql::{self, Naming, ParamValue, ParameterizedQuery, QueryParam};

use super::rows::{decode_rows, Row, TableSchema};
use super::KnowledgeEngine;

pub const DEFAULT_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery REST backend
#[derive(Clone)]
pub struct BigQueryBackend {
    http_client: Client,
    api_base: String,
    access_token: String,
    naming: Naming,
    timeout: Duration,
}

impl BigQueryBackend {
    pub fn new(config: &EngineConfig, api_base: &str, access_token: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            naming: Naming::new(&config.project_id, &config.dataset),
            timeout: config.request_timeout,
        }
    }

    /// Create from environment variables
    ///
    /// Required: `BIGQUERY_ACCESS_TOKEN`
    /// Optional: `BIGQUERY_API_BASE`
    pub fn from_env(config: &EngineConfig) -> Result<Self> {
        let token = std::env::var("BIGQUERY_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::Config("BIGQUERY_ACCESS_TOKEN must be set for the bigquery engine".into())
            })?;
        let api_base =
            std::env::var("BIGQUERY_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Ok(Self::new(config, &api_base, token.trim()))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    fn queries_url(&self) -> String {
        format!("{}/projects/{}/queries", self.api_base, self.naming.project)
    }

    /// Run a query and decode its rows
    pub async fn run(&self, query: &ParameterizedQuery) -> Result<Vec<Row>> {
        let request = QueryRequest::from_query(query, self.timeout);
        debug!(sql = %query.sql, params = query.params.len(), "BigQuery jobs.query");

        let response = self
            .http_client
            .post(self.queries_url())
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Engine(format!(
                "BigQuery API error {}: {}",
                status, body
            )));
        }

        let result: QueryResponse = response.json().await?;
        result.into_rows(self.timeout)
    }
}

/// `jobs.query` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<Value>,
    timeout_ms: u64,
    request_id: String,
}

impl QueryRequest {
    fn from_query(query: &ParameterizedQuery, timeout: Duration) -> Self {
        Self {
            query: query.sql.clone(),
            use_legacy_sql: false,
            parameter_mode: (!query.params.is_empty()).then_some("NAMED"),
            query_parameters: query.params.iter().map(encode_param).collect(),
            timeout_ms: timeout.as_millis() as u64,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

fn scalar_param(name: &str, ty: &str, value: String) -> Value {
    json!({
        "name": name,
        "parameterType": {"type": ty},
        "parameterValue": {"value": value},
    })
}

fn array_param(name: &str, ty: &str, values: Vec<String>) -> Value {
    json!({
        "name": name,
        "parameterType": {"type": "ARRAY", "arrayType": {"type": ty}},
        "parameterValue": {
            "arrayValues": values.into_iter().map(|v| json!({"value": v})).collect::<Vec<_>>(),
        },
    })
}

/// Encode a named parameter in the REST wire format (all values are strings)
fn encode_param(param: &QueryParam) -> Value {
    match &param.value {
        ParamValue::String(s) => scalar_param(param.name, "STRING", s.clone()),
        ParamValue::Int64(i) => scalar_param(param.name, "INT64", i.to_string()),
        ParamValue::Float64(f) => scalar_param(param.name, "FLOAT64", f.to_string()),
        ParamValue::Json(s) => scalar_param(param.name, "JSON", s.clone()),
        ParamValue::StringArray(items) => array_param(param.name, "STRING", items.clone()),
        ParamValue::FloatArray(items) => array_param(
            param.name,
            "FLOAT64",
            items.iter().map(|f| f.to_string()).collect(),
        ),
    }
}

/// `jobs.query` response body (only the fields we read)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    errors: Vec<JobError>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: String,
}

impl QueryResponse {
    fn into_rows(self, timeout: Duration) -> Result<Vec<Row>> {
        if let Some(first) = self.errors.first() {
            return Err(Error::Engine(match &first.reason {
                Some(reason) => format!("{}: {}", reason, first.message),
                None => first.message.clone(),
            }));
        }
        if self.job_complete == Some(false) {
            return Err(Error::Timeout(timeout.as_secs()));
        }
        match self.schema {
            Some(schema) => decode_rows(&schema, &self.rows),
            // DML statements come back without a schema
            None => Ok(vec![]),
        }
    }
}

#[async_trait]
impl KnowledgeEngine for BigQueryBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let rows = self.run(&sql::embed_text(&self.naming, text)).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Engine("embedding model returned no rows".into()))?;
        row.get_f64_array("embedding")
    }

    async fn search(&self, embedding: &[f64], k: usize, role: &str) -> Result<Vec<SearchHit>> {
        let rows = self
            .run(&sql::knowledge_search(&self.naming, embedding, k, role))
            .await?;
        rows.iter()
            .map(|row| {
                Ok(SearchHit {
                    knowledge_id: row.get_str("knowledge_id")?,
                    content: row.get_str("content")?,
                    similarity: row.get_f64("similarity")?,
                })
            })
            .collect()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let rows = self.run(&sql::generate_text(&self.naming, prompt)).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Engine("generation model returned no rows".into()))?;
        row.get_str("generated_text")
    }

    async fn forecast(
        &self,
        metric_name: &str,
        horizon_days: u32,
        confidence_level: f64,
    ) -> Result<Vec<ForecastRow>> {
        let query = sql::forecast(&self.naming, metric_name, horizon_days, confidence_level);
        let rows = self.run(&query).await?;
        rows.iter()
            .map(|row| {
                Ok(ForecastRow {
                    timestamp: row.get_timestamp("forecast_timestamp")?,
                    value: row.get_f64("forecast_value")?,
                    lower: row.get_f64("prediction_interval_lower_bound")?,
                    upper: row.get_f64("prediction_interval_upper_bound")?,
                })
            })
            .collect()
    }

    async fn personalized_insights(
        &self,
        role: &str,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<PersonalizedInsight>> {
        let query = sql::personalized_insights(&self.naming, role, window_days, limit);
        let rows = self.run(&query).await?;
        rows.iter()
            .map(|row| {
                Ok(PersonalizedInsight {
                    insight_id: row.get_str("insight_id")?,
                    content: row.get_str("content")?,
                    confidence_score: row.get_f64("confidence_score")?,
                    business_impact_score: row.get_f64("business_impact_score")?,
                    relevance_score: row.get_f64_or("relevance_score", 0.0),
                    generated_timestamp: row.get_timestamp("generated_timestamp")?,
                })
            })
            .collect()
    }

    async fn daily_metrics(&self) -> Result<Vec<MetricValue>> {
        let rows = self.run(&sql::daily_metrics(&self.naming)).await?;
        rows.iter()
            .map(|row| {
                Ok(MetricValue {
                    metric_name: row.get_str("metric_name")?,
                    metric_value: row.get_f64_or("metric_value", 0.0),
                })
            })
            .collect()
    }

    async fn recent_top_insights(
        &self,
        window_hours: u32,
        limit: usize,
    ) -> Result<Vec<RecentInsight>> {
        let query = sql::recent_top_insights(&self.naming, window_hours, limit);
        let rows = self.run(&query).await?;
        rows.iter()
            .map(|row| {
                Ok(RecentInsight {
                    insight_id: row.get_str("insight_id")?,
                    content: row.get_str("content")?,
                    business_impact_score: row.get_f64("business_impact_score")?,
                    generated_timestamp: row.get_timestamp("generated_timestamp")?,
                })
            })
            .collect()
    }

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        let query = sql::upsert_preferences(&self.naming, prefs)?;
        self.run(&query).await?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let probe = ParameterizedQuery {
            sql: "SELECT 1 AS ok".to_string(),
            params: vec![],
        };
        self.run(&probe).await.is_ok()
    }

    fn name(&self) -> &str {
        "bigquery"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockBigQueryServer;

    fn backend(api_base: &str) -> BigQueryBackend {
        let config = EngineConfig::with_project("acme-prod").unwrap();
        BigQueryBackend::new(&config, api_base, "token")
    }

    #[test]
    fn test_backend_trims_trailing_slash() {
        let b = backend("http://localhost:9050/bigquery/v2/");
        assert_eq!(b.api_base(), "http://localhost:9050/bigquery/v2");
        assert_eq!(
            b.queries_url(),
            "http://localhost:9050/bigquery/v2/projects/acme-prod/queries"
        );
        assert_eq!(b.naming().dataset, "enterprise_ai");
    }

    #[test]
    fn test_scalar_and_array_params_encoding() {
        let query = sql::knowledge_search(&Naming::new("p", "d"), &[0.5, -1.0], 5, "analyst");
        let request = QueryRequest::from_query(&query, Duration::from_secs(30));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["useLegacySql"], false);
        assert_eq!(json["parameterMode"], "NAMED");
        assert_eq!(json["timeoutMs"], 30_000);

        let params = json["queryParameters"].as_array().unwrap();
        assert_eq!(params[0]["name"], "user_role");
        assert_eq!(params[0]["parameterType"]["type"], "STRING");
        assert_eq!(params[0]["parameterValue"]["value"], "analyst");

        assert_eq!(params[1]["parameterType"]["type"], "ARRAY");
        assert_eq!(params[1]["parameterType"]["arrayType"]["type"], "FLOAT64");
        assert_eq!(params[1]["parameterValue"]["arrayValues"][0]["value"], "0.5");
        assert_eq!(params[1]["parameterValue"]["arrayValues"][1]["value"], "-1");
    }

    #[test]
    fn test_unparameterized_query_omits_mode() {
        let query = sql::daily_metrics(&Naming::new("p", "d"));
        let json = serde_json::to_value(QueryRequest::from_query(&query, Duration::from_secs(5)))
            .unwrap();
        assert!(json.get("parameterMode").is_none());
        assert!(json.get("queryParameters").is_none());
    }

    #[test]
    fn test_response_rows_decoded() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "metric_name", "type": "STRING"},
                {"name": "metric_value", "type": "FLOAT"}
            ]},
            "rows": [{"f": [{"v": "total_insights"}, {"v": "12"}]}]
        }))
        .unwrap();

        let rows = response.into_rows(Duration::from_secs(30)).unwrap();
        assert_eq!(rows[0].get_str("metric_name").unwrap(), "total_insights");
        assert_eq!(rows[0].get_f64("metric_value").unwrap(), 12.0);
    }

    #[test]
    fn test_incomplete_job_is_timeout() {
        let response: QueryResponse =
            serde_json::from_value(json!({"jobComplete": false})).unwrap();
        assert!(matches!(
            response.into_rows(Duration::from_secs(30)),
            Err(Error::Timeout(30))
        ));
    }

    #[test]
    fn test_job_errors_are_engine_errors() {
        let response: QueryResponse = serde_json::from_value(json!({
            "jobComplete": true,
            "errors": [{"reason": "quotaExceeded", "message": "Quota exceeded"}]
        }))
        .unwrap();
        match response.into_rows(Duration::from_secs(30)) {
            Err(Error::Engine(msg)) => assert_eq!(msg, "quotaExceeded: Quota exceeded"),
            other => panic!("expected engine error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let server = MockBigQueryServer::start().await;
        let b = backend(&server.url());

        let embedding = b.embed("revenue trends").await.unwrap();
        assert_eq!(embedding, vec![0.6, 0.8]);

        let hits = b.search(&embedding, 5, "executive").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].knowledge_id, "kb-1");
        assert!((hits[0].similarity - 0.91).abs() < 1e-9);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0]["queryParameters"][0]["parameterValue"]["value"],
            "revenue trends"
        );
        assert!(requests[1]["query"]
            .as_str()
            .unwrap()
            .contains("`acme-prod.enterprise_ai.enterprise_knowledge_base`"));
    }

    #[tokio::test]
    async fn test_forecast_and_dashboard_against_mock_server() {
        let server = MockBigQueryServer::start().await;
        let b = backend(&server.url());

        let rows = b.forecast("revenue", 3, 0.95).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].timestamp.to_rfc3339(), "2024-11-16T00:00:00+00:00");
        assert!(rows.iter().all(|r| r.lower <= r.value && r.value <= r.upper));

        let metrics = b.daily_metrics().await.unwrap();
        assert_eq!(metrics[0].metric_name, "total_insights");
        assert_eq!(metrics[0].metric_value, 4.0);

        let recent = b.recent_top_insights(24, 5).await.unwrap();
        assert_eq!(recent[0].insight_id, "ins-2");

        let personalized = b.personalized_insights("analyst", 7, 10).await.unwrap();
        assert_eq!(personalized[0].relevance_score, 0.8);

        assert_eq!(b.generate("prompt").await.unwrap(), "Mock generated insight");
        assert!(b.health_check().await);
    }

    #[tokio::test]
    async fn test_upsert_sends_merge() {
        let server = MockBigQueryServer::start().await;
        let b = backend(&server.url());

        let prefs = UserPreferences {
            user_id: "u1".into(),
            role: "executive".into(),
            departments: ["finance".to_string()].into_iter().collect(),
            notification_preferences: Default::default(),
            priority_topics: Default::default(),
        };
        b.upsert_preferences(&prefs).await.unwrap();

        let requests = server.requests();
        assert!(requests[0]["query"].as_str().unwrap().starts_with("MERGE"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_engine_error() {
        let server = MockBigQueryServer::start_failing(axum::http::StatusCode::FORBIDDEN).await;
        let b = backend(&server.url());

        match b.generate("prompt").await {
            Err(Error::Engine(msg)) => assert!(msg.starts_with("BigQuery API error 403")),
            other => panic!("expected engine error, got {:?}", other),
        }
        assert!(!b.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let b = backend("http://localhost:1");
        assert!(!b.health_check().await);
    }
}

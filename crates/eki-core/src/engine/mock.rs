//! Mock engine for testing
//!
//! Deterministic, configurable stand-in for the warehouse. Clones share
//! state, so a test can keep one handle and inspect calls made through
//! another.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use crate::error::{Error, Result};
use crate::models::{
    ForecastRow, MetricValue, PersonalizedInsight, RecentInsight, SearchHit, UserPreferences,
};

use super::KnowledgeEngine;

/// Failure injected into every engine call
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    /// Engine-reported job error (quota, malformed SQL, ...)
    Engine(String),
    /// Transport timeout
    Timeout,
    /// Never answer; exercises the caller's own timeout
    Hang,
}

#[derive(Debug, Clone)]
struct MockRecord {
    hit: SearchHit,
    /// Roles allowed to read the record; empty means everyone
    roles: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockInsight {
    insight: PersonalizedInsight,
    audience: Vec<String>,
}

#[derive(Debug, Default)]
struct MockState {
    records: Vec<MockRecord>,
    generated_text: String,
    forecast_rows: Option<Vec<ForecastRow>>,
    insights: Vec<MockInsight>,
    metrics: Vec<MetricValue>,
    recent: Vec<RecentInsight>,
    preferences: BTreeMap<String, UserPreferences>,
    prompts: Vec<String>,
    failure: Option<MockFailure>,
    /// Calls left before the failure stops; None fails forever
    failures_remaining: Option<usize>,
}

/// Mock knowledge engine
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    calls: Arc<AtomicUsize>,
    healthy: bool,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Empty mock: no records, no insights (healthy by default)
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                generated_text: "Mock insight".to_string(),
                ..Default::default()
            })),
            calls: Arc::new(AtomicUsize::new(0)),
            healthy: true,
        }
    }

    /// Mock preloaded with a small enterprise corpus, for local demos
    pub fn demo() -> Self {
        let now = Utc::now();
        Self::new()
            .with_record(
                "doc_001",
                "Q3 2024 Revenue Analysis: 23% growth to $45M driven by AI product adoption. \
                 Customer retention improved to 94%.",
                0.92,
                &["executive", "analyst"],
            )
            .with_record(
                "doc_002",
                "The new AI-powered document search saves teams 15 hours per week, but the \
                 mobile app crashes on PDFs over 50MB.",
                0.78,
                &[],
            )
            .with_record(
                "doc_003",
                "Vector search query time reduced from 1.2s to 0.28s; memory usage down 42% \
                 through embedding compression.",
                0.74,
                &["engineering", "analyst"],
            )
            .with_generated_text(
                "Revenue grew 23% on AI adoption; prioritise infrastructure scaling and the \
                 mobile PDF crash to protect retention.",
            )
            .with_personalized_insight(
                PersonalizedInsight {
                    insight_id: "insight_demo_1".into(),
                    content: "Customer satisfaction scores improved by 12%".into(),
                    confidence_score: 0.89,
                    business_impact_score: 0.76,
                    relevance_score: 0.94,
                    generated_timestamp: now - ChronoDuration::hours(6),
                },
                &["analyst", "executive"],
            )
            .with_metrics(vec![
                MetricValue {
                    metric_name: "total_insights".into(),
                    metric_value: 12.0,
                },
                MetricValue {
                    metric_name: "avg_confidence".into(),
                    metric_value: 0.86,
                },
            ])
            .with_recent_insights(vec![RecentInsight {
                insight_id: "insight_demo_1".into(),
                content: "Customer satisfaction scores improved by 12%".into(),
                business_impact_score: 0.76,
                generated_timestamp: now - ChronoDuration::hours(6),
            }])
    }

    fn update(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    /// Add a knowledge record returned by `search` with a fixed similarity
    pub fn with_record(self, id: &str, content: &str, similarity: f64, roles: &[&str]) -> Self {
        let record = MockRecord {
            hit: SearchHit {
                knowledge_id: id.to_string(),
                content: content.to_string(),
                similarity,
            },
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        self.update(|s| s.records.push(record))
    }

    pub fn with_generated_text(self, text: &str) -> Self {
        let text = text.to_string();
        self.update(|s| s.generated_text = text)
    }

    /// Fix the forecast output; otherwise one row per horizon day is synthesised
    pub fn with_forecast_rows(self, rows: Vec<ForecastRow>) -> Self {
        self.update(|s| s.forecast_rows = Some(rows))
    }

    pub fn with_personalized_insight(self, insight: PersonalizedInsight, audience: &[&str]) -> Self {
        let entry = MockInsight {
            insight,
            audience: audience.iter().map(|r| r.to_string()).collect(),
        };
        self.update(|s| s.insights.push(entry))
    }

    pub fn with_metrics(self, metrics: Vec<MetricValue>) -> Self {
        self.update(|s| s.metrics = metrics)
    }

    pub fn with_recent_insights(self, recent: Vec<RecentInsight>) -> Self {
        self.update(|s| s.recent = recent)
    }

    /// Fail every call
    pub fn failing(self, failure: MockFailure) -> Self {
        self.update(|s| {
            s.failure = Some(failure);
            s.failures_remaining = None;
        })
    }

    /// Fail the next `times` calls, then behave normally
    pub fn failing_times(self, failure: MockFailure, times: usize) -> Self {
        self.update(|s| {
            s.failure = Some(failure);
            s.failures_remaining = Some(times);
        })
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Number of engine calls made so far (health checks excluded)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts passed to `generate`, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.prompts.clone())
            .unwrap_or_default()
    }

    /// Stored preferences for a user
    pub fn preferences(&self, user_id: &str) -> Option<UserPreferences> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.preferences.get(user_id).cloned())
    }

    pub fn preference_count(&self) -> usize {
        self.state.lock().map(|s| s.preferences.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| Error::Engine("mock engine state poisoned".into()))
    }

    /// Count the call and apply any injected failure
    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failure = {
            let mut state = self.lock()?;
            match (state.failure.clone(), state.failures_remaining) {
                (Some(_), Some(0)) | (None, _) => None,
                (Some(f), Some(n)) => {
                    state.failures_remaining = Some(n - 1);
                    Some(f)
                }
                (Some(f), None) => Some(f),
            }
        };

        match failure {
            None => Ok(()),
            Some(MockFailure::Engine(msg)) => Err(Error::Engine(msg)),
            Some(MockFailure::Timeout) => Err(Error::Timeout(0)),
            Some(MockFailure::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Timeout(3600))
            }
        }
    }
}

/// Deterministic 8-dimensional embedding derived from the text bytes
fn pseudo_embedding(text: &str) -> Vec<f64> {
    let mut v = vec![0.0; 8];
    for (i, b) in text.bytes().enumerate() {
        v[i % 8] += f64::from(b);
    }
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[async_trait]
impl KnowledgeEngine for MockEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        self.enter().await?;
        Ok(pseudo_embedding(text))
    }

    async fn search(&self, _embedding: &[f64], k: usize, role: &str) -> Result<Vec<SearchHit>> {
        self.enter().await?;
        let state = self.lock()?;
        let mut hits: Vec<SearchHit> = state
            .records
            .iter()
            .filter(|r| r.roles.is_empty() || r.roles.iter().any(|allowed| allowed == role))
            .map(|r| r.hit.clone())
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.enter().await?;
        let mut state = self.lock()?;
        state.prompts.push(prompt.to_string());
        Ok(state.generated_text.clone())
    }

    async fn forecast(
        &self,
        _metric_name: &str,
        horizon_days: u32,
        _confidence_level: f64,
    ) -> Result<Vec<ForecastRow>> {
        self.enter().await?;
        let state = self.lock()?;
        if let Some(rows) = &state.forecast_rows {
            return Ok(rows.clone());
        }

        let start = Utc
            .with_ymd_and_hms(2024, 11, 16, 0, 0, 0)
            .single()
            .ok_or_else(|| Error::Engine("invalid mock start date".into()))?;
        Ok((0..horizon_days)
            .map(|day| {
                let value = 100.0 + f64::from(day);
                ForecastRow {
                    timestamp: start + ChronoDuration::days(i64::from(day)),
                    value,
                    lower: value - 5.0,
                    upper: value + 5.0,
                }
            })
            .collect())
    }

    async fn personalized_insights(
        &self,
        role: &str,
        window_days: u32,
        limit: usize,
    ) -> Result<Vec<PersonalizedInsight>> {
        self.enter().await?;
        let state = self.lock()?;
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(window_days));
        Ok(state
            .insights
            .iter()
            .filter(|i| i.audience.iter().any(|a| a == role))
            .filter(|i| i.insight.generated_timestamp >= cutoff)
            .take(limit)
            .map(|i| i.insight.clone())
            .collect())
    }

    async fn daily_metrics(&self) -> Result<Vec<MetricValue>> {
        self.enter().await?;
        Ok(self.lock()?.metrics.clone())
    }

    async fn recent_top_insights(
        &self,
        _window_hours: u32,
        limit: usize,
    ) -> Result<Vec<RecentInsight>> {
        self.enter().await?;
        let state = self.lock()?;
        Ok(state.recent.iter().take(limit).cloned().collect())
    }

    async fn upsert_preferences(&self, prefs: &UserPreferences) -> Result<()> {
        self.enter().await?;
        self.lock()?
            .preferences
            .insert(prefs.user_id.clone(), prefs.clone());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_applies_role_filter_and_order() {
        let engine = MockEngine::new()
            .with_record("a", "public", 0.71, &[])
            .with_record("b", "exec only", 0.95, &["executive"])
            .with_record("c", "analyst", 0.80, &["analyst"]);

        let hits = engine.search(&[], 5, "analyst").await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.knowledge_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);

        let hits = engine.search(&[], 1, "executive").await.unwrap();
        assert_eq!(hits[0].knowledge_id, "b");
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn test_synthesised_forecast_matches_horizon() {
        let engine = MockEngine::new();
        let rows = engine.forecast("revenue", 7, 0.95).await.unwrap();
        assert_eq!(rows.len(), 7);
        assert!(rows.iter().all(|r| r.lower <= r.value && r.value <= r.upper));
    }

    #[tokio::test]
    async fn test_failing_times_recovers() {
        let engine = MockEngine::new().failing_times(MockFailure::Timeout, 1);
        assert!(matches!(engine.embed("x").await, Err(Error::Timeout(_))));
        assert!(engine.embed("x").await.is_ok());
        assert_eq!(engine.calls(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let engine = MockEngine::new();
        let handle = engine.clone();
        engine.generate("hello").await.unwrap();
        assert_eq!(handle.prompts(), vec!["hello".to_string()]);
        assert_eq!(handle.calls(), 1);
    }

    #[test]
    fn test_pseudo_embedding_is_unit_length() {
        let v = pseudo_embedding("revenue trends");
        let norm: f64 = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert_eq!(v, pseudo_embedding("revenue trends"));
    }
}

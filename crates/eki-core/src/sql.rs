//! SQL templates for the knowledge engine
//!
//! All warehouse objects are addressed by fully qualified names built from the
//! configured project and dataset. Caller-supplied text always travels as a
//! named query parameter; the only interpolated values are identifiers that
//! passed [`is_valid_identifier`] and numbers.

use crate::classify::{ContentCategory, CATEGORIES};

pub const KNOWLEDGE_BASE_TABLE: &str = "enterprise_knowledge_base";
pub const GENERATED_INSIGHTS_TABLE: &str = "generated_insights";
pub const USER_PREFERENCES_TABLE: &str = "user_preferences";
pub const EMBEDDING_MODEL: &str = "text_embedding_model";
pub const GENERATION_MODEL: &str = "gemini_model";
pub const FORECAST_MODEL_PREFIX: &str = "forecast_model_";

/// Public table scanned by the content analysis query
pub const HACKER_NEWS_TABLE: &str = "bigquery-public-data.hacker_news.full";

/// True for `[A-Za-z_][A-Za-z0-9_]*`, max 128 chars
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Metric names become part of a model name: letter first, max 64 chars
pub fn is_valid_metric_name(name: &str) -> bool {
    name.len() <= 64
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && is_valid_identifier(name)
}

/// Project/dataset pair used to qualify tables and models
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub project: String,
    pub dataset: String,
}

impl Naming {
    pub fn new(project: &str, dataset: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
        }
    }

    /// Backquoted `project.dataset.object`
    pub fn qualify(&self, object: &str) -> String {
        format!("`{}.{}.{}`", self.project, self.dataset, object)
    }

    /// Per-metric forecasting model, named by convention
    pub fn forecast_model(&self, metric_name: &str) -> String {
        self.qualify(&format!("{}{}", FORECAST_MODEL_PREFIX, metric_name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int64(i64),
    Float64(f64),
    Json(String),
    StringArray(Vec<String>),
    FloatArray(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub name: &'static str,
    pub value: ParamValue,
}

impl QueryParam {
    pub fn string(name: &'static str, value: &str) -> Self {
        Self {
            name,
            value: ParamValue::String(value.to_string()),
        }
    }

    pub fn int64(name: &'static str, value: i64) -> Self {
        Self {
            name,
            value: ParamValue::Int64(value),
        }
    }
}

/// SQL text plus its named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterizedQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl ParameterizedQuery {
    fn new(sql: String, params: Vec<QueryParam>) -> Self {
        Self { sql, params }
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

/// Embed a single text with the embedding model
pub fn embed_text(naming: &Naming, text: &str) -> ParameterizedQuery {
    let sql = format!(
        "SELECT ml_generate_embedding_result AS embedding\n\
         FROM ML.GENERATE_EMBEDDING(\n  MODEL {model},\n  (SELECT @content AS content),\n  STRUCT(TRUE AS flatten_json_output)\n)",
        model = naming.qualify(EMBEDDING_MODEL),
    );
    ParameterizedQuery::new(sql, vec![QueryParam::string("content", text)])
}

/// Top-K cosine search over the knowledge base, restricted to records the
/// role may read (no permission list means readable by everyone)
pub fn knowledge_search(
    naming: &Naming,
    embedding: &[f64],
    top_k: usize,
    user_role: &str,
) -> ParameterizedQuery {
    let sql = format!(
        "SELECT\n  base.knowledge_id AS knowledge_id,\n  base.content AS content,\n  1 - distance AS similarity\n\
         FROM VECTOR_SEARCH(\n  (\n    SELECT * FROM {table}\n    WHERE access_permissions IS NULL\n       OR ARRAY_LENGTH(access_permissions) = 0\n       OR @user_role IN UNNEST(access_permissions)\n  ),\n  'embedding',\n  (SELECT @query_embedding AS embedding),\n  top_k => {top_k},\n  distance_type => 'COSINE'\n)\n\
         ORDER BY similarity DESC",
        table = naming.qualify(KNOWLEDGE_BASE_TABLE),
        top_k = top_k,
    );
    ParameterizedQuery::new(
        sql,
        vec![
            QueryParam::string("user_role", user_role),
            QueryParam {
                name: "query_embedding",
                value: ParamValue::FloatArray(embedding.to_vec()),
            },
        ],
    )
}

/// Free-text generation with the generation model
pub fn generate_text(naming: &Naming, prompt: &str) -> ParameterizedQuery {
    let sql = format!(
        "SELECT ml_generate_text_llm_result AS generated_text\n\
         FROM ML.GENERATE_TEXT(\n  MODEL {model},\n  (SELECT @prompt AS prompt),\n  STRUCT(0.2 AS temperature, TRUE AS flatten_json_output)\n)",
        model = naming.qualify(GENERATION_MODEL),
    );
    ParameterizedQuery::new(sql, vec![QueryParam::string("prompt", prompt)])
}

/// Forecast a metric's series
///
/// `metric_name` must already satisfy [`is_valid_metric_name`]; horizon and
/// confidence are inlined because the model options only take literals.
pub fn forecast(
    naming: &Naming,
    metric_name: &str,
    horizon_days: u32,
    confidence_level: f64,
) -> ParameterizedQuery {
    let sql = format!(
        "SELECT\n  forecast_timestamp,\n  forecast_value,\n  prediction_interval_lower_bound,\n  prediction_interval_upper_bound\n\
         FROM ML.FORECAST(\n  MODEL {model},\n  STRUCT({horizon} AS horizon, {confidence} AS confidence_level)\n)\n\
         ORDER BY forecast_timestamp",
        model = naming.forecast_model(metric_name),
        horizon = horizon_days,
        confidence = confidence_level,
    );
    ParameterizedQuery::new(sql, vec![])
}

/// Recent insights for a role, rated for relevance by the generation model
pub fn personalized_insights(
    naming: &Naming,
    user_role: &str,
    window_days: u32,
    limit: usize,
) -> ParameterizedQuery {
    let sql = format!(
        "WITH recent AS (\n  SELECT insight_id, content, confidence_score, business_impact_score, generated_timestamp\n  FROM {table}\n  WHERE @user_role IN UNNEST(target_audience)\n    AND generated_timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL @window_days DAY)\n),\n\
         rated AS (\n  SELECT *\n  FROM ML.GENERATE_TEXT(\n    MODEL {model},\n    (\n      SELECT *, CONCAT('Rate relevance from 0 to 1 for role ', @user_role, '. Reply with a number only: ', content) AS prompt\n      FROM recent\n    ),\n    STRUCT(0.0 AS temperature, TRUE AS flatten_json_output)\n  )\n)\n\
         SELECT\n  insight_id,\n  content,\n  confidence_score,\n  business_impact_score,\n  generated_timestamp,\n  COALESCE(SAFE_CAST(TRIM(ml_generate_text_llm_result) AS FLOAT64), 0.0) AS relevance_score\n\
         FROM rated\n\
         ORDER BY relevance_score DESC, business_impact_score DESC\n\
         LIMIT @limit_count",
        table = naming.qualify(GENERATED_INSIGHTS_TABLE),
        model = naming.qualify(GENERATION_MODEL),
    );
    ParameterizedQuery::new(
        sql,
        vec![
            QueryParam::string("user_role", user_role),
            QueryParam::int64("window_days", i64::from(window_days)),
            QueryParam::int64("limit_count", limit as i64),
        ],
    )
}

/// Today's key counters
pub fn daily_metrics(naming: &Naming) -> ParameterizedQuery {
    let table = naming.qualify(GENERATED_INSIGHTS_TABLE);
    let sql = format!(
        "SELECT 'total_insights' AS metric_name, CAST(COUNT(*) AS FLOAT64) AS metric_value\n\
         FROM {table}\nWHERE DATE(generated_timestamp) = CURRENT_DATE()\n\
         UNION ALL\n\
         SELECT 'avg_confidence' AS metric_name, COALESCE(AVG(confidence_score), 0.0) AS metric_value\n\
         FROM {table}\nWHERE DATE(generated_timestamp) = CURRENT_DATE()",
        table = table,
    );
    ParameterizedQuery::new(sql, vec![])
}

/// Highest-impact insights from the trailing window
pub fn recent_top_insights(naming: &Naming, window_hours: u32, limit: usize) -> ParameterizedQuery {
    let sql = format!(
        "SELECT insight_id, content, business_impact_score, generated_timestamp\n\
         FROM {table}\n\
         WHERE generated_timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL @window_hours HOUR)\n\
         ORDER BY business_impact_score DESC\n\
         LIMIT @limit_count",
        table = naming.qualify(GENERATED_INSIGHTS_TABLE),
    );
    ParameterizedQuery::new(
        sql,
        vec![
            QueryParam::int64("window_hours", i64::from(window_hours)),
            QueryParam::int64("limit_count", limit as i64),
        ],
    )
}

/// Insert or replace the preferences row for `user_id`
pub fn upsert_preferences(
    naming: &Naming,
    prefs: &crate::models::UserPreferences,
) -> crate::error::Result<ParameterizedQuery> {
    let sql = format!(
        "MERGE {table} AS target\n\
         USING (SELECT @user_id AS user_id) AS source\n\
         ON target.user_id = source.user_id\n\
         WHEN MATCHED THEN UPDATE SET\n  role = @role,\n  departments = @departments,\n  notification_preferences = @notification_preferences,\n  priority_topics = @priority_topics,\n  updated_timestamp = CURRENT_TIMESTAMP()\n\
         WHEN NOT MATCHED THEN INSERT\n  (user_id, role, departments, notification_preferences, priority_topics, updated_timestamp)\n  VALUES (@user_id, @role, @departments, @notification_preferences, @priority_topics, CURRENT_TIMESTAMP())",
        table = naming.qualify(USER_PREFERENCES_TABLE),
    );
    Ok(ParameterizedQuery::new(
        sql,
        vec![
            QueryParam::string("user_id", &prefs.user_id),
            QueryParam::string("role", &prefs.role),
            QueryParam {
                name: "departments",
                value: ParamValue::StringArray(prefs.departments.iter().cloned().collect()),
            },
            QueryParam {
                name: "notification_preferences",
                value: ParamValue::Json(serde_json::to_string(&prefs.notification_preferences)?),
            },
            QueryParam {
                name: "priority_topics",
                value: ParamValue::StringArray(prefs.priority_topics.iter().cloned().collect()),
            },
        ],
    ))
}

/// `CASE` expression assigning a [`ContentCategory`] to `LOWER(title)`
fn category_case_expression() -> String {
    let mut case = String::from("CASE\n");
    for (category, keywords) in CATEGORIES {
        case.push_str(&format!(
            "    WHEN REGEXP_CONTAINS(LOWER(title), r'\\b({})\\b') THEN '{}'\n",
            keywords.join("|"),
            category.as_str()
        ));
    }
    case.push_str(&format!(
        "    ELSE '{}'\n  END",
        ContentCategory::General.as_str()
    ));
    case
}

/// Per-category engagement statistics over recent Hacker News stories
///
/// The tier thresholds mirror [`crate::classify::performance_tier`] and
/// [`crate::classify::market_potential`].
pub fn content_analysis(window_days: u32) -> ParameterizedQuery {
    let sql = format!(
        "SELECT\n  {case} AS content_category,\n\
         \n  COUNT(*) AS post_count,\n  AVG(score) AS avg_score,\n  STDDEV(score) AS score_stddev,\n  AVG(descendants) AS avg_comments,\n  AVG(LENGTH(title)) AS avg_title_length,\n  AVG(CASE WHEN url IS NOT NULL THEN 1 ELSE 0 END) AS url_percentage,\n  ROUND(AVG(descendants) / NULLIF(AVG(score), 0), 2) AS comment_to_score_ratio,\n\
         \n  CASE\n    WHEN AVG(score) > 20 THEN 'HIGH_PERFORMANCE'\n    WHEN AVG(score) > 10 THEN 'MEDIUM_PERFORMANCE'\n    ELSE 'LOW_PERFORMANCE'\n  END AS performance_tier,\n\
         \n  CASE\n    WHEN COUNT(*) > 100 AND AVG(score) > 15 THEN 'HIGH_POTENTIAL'\n    WHEN COUNT(*) > 50 AND AVG(score) > 8 THEN 'MEDIUM_POTENTIAL'\n    ELSE 'LOW_POTENTIAL'\n  END AS market_potential\n\
         \nFROM `{table}`\n\
         WHERE timestamp >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL @window_days DAY)\n  AND score IS NOT NULL\n  AND score > 0\n  AND type = 'story'\n  AND title IS NOT NULL\n\
         GROUP BY content_category\n\
         ORDER BY avg_score DESC",
        case = category_case_expression(),
        table = HACKER_NEWS_TABLE,
    );
    ParameterizedQuery::new(
        sql,
        vec![QueryParam::int64("window_days", i64::from(window_days))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserPreferences;

    fn naming() -> Naming {
        Naming::new("acme-prod", "enterprise_ai")
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("enterprise_ai"));
        assert!(is_valid_identifier("_private"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("9lives"));
        assert!(!is_valid_identifier("a-b"));
        assert!(!is_valid_identifier("a`b"));

        assert!(is_valid_metric_name("revenue"));
        assert!(is_valid_metric_name("daily_active_users"));
        assert!(!is_valid_metric_name("_revenue"));
        assert!(!is_valid_metric_name(&"r".repeat(65)));
    }

    #[test]
    fn test_qualified_names() {
        let n = naming();
        assert_eq!(
            n.qualify(KNOWLEDGE_BASE_TABLE),
            "`acme-prod.enterprise_ai.enterprise_knowledge_base`"
        );
        assert_eq!(
            n.forecast_model("revenue"),
            "`acme-prod.enterprise_ai.forecast_model_revenue`"
        );
    }

    #[test]
    fn test_search_keeps_role_out_of_sql_text() {
        let q = knowledge_search(&naming(), &[0.1, 0.2], 5, "executive' OR 1=1 --");
        assert!(q.sql.contains("top_k => 5"));
        assert!(q.sql.contains("@user_role IN UNNEST(access_permissions)"));
        assert!(!q.sql.contains("OR 1=1"));
        assert_eq!(
            q.param("user_role"),
            Some(&ParamValue::String("executive' OR 1=1 --".into()))
        );
        assert_eq!(
            q.param("query_embedding"),
            Some(&ParamValue::FloatArray(vec![0.1, 0.2]))
        );
    }

    #[test]
    fn test_forecast_inlines_options() {
        let q = forecast(&naming(), "revenue", 7, 0.9);
        assert!(q.sql.contains("forecast_model_revenue"));
        assert!(q.sql.contains("STRUCT(7 AS horizon, 0.9 AS confidence_level)"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_personalized_params() {
        let q = personalized_insights(&naming(), "analyst", 7, 10);
        assert!(q.sql.contains("ORDER BY relevance_score DESC, business_impact_score DESC"));
        assert_eq!(q.param("window_days"), Some(&ParamValue::Int64(7)));
        assert_eq!(q.param("limit_count"), Some(&ParamValue::Int64(10)));
    }

    #[test]
    fn test_upsert_preferences_is_merge() {
        let prefs = UserPreferences {
            user_id: "u1".into(),
            role: "executive".into(),
            departments: ["finance".to_string()].into_iter().collect(),
            notification_preferences: [("email".to_string(), true)].into_iter().collect(),
            priority_topics: Default::default(),
        };
        let q = upsert_preferences(&naming(), &prefs).unwrap();
        assert!(q.sql.starts_with("MERGE `acme-prod.enterprise_ai.user_preferences`"));
        assert_eq!(
            q.param("notification_preferences"),
            Some(&ParamValue::Json(r#"{"email":true}"#.into()))
        );
    }

    #[test]
    fn test_content_analysis_lists_every_category() {
        let q = content_analysis(30);
        for (category, _) in CATEGORIES {
            assert!(q.sql.contains(&format!("THEN '{}'", category.as_str())));
        }
        assert!(q.sql.contains("ELSE 'GENERAL'"));
        assert!(q.sql.contains("bigquery-public-data.hacker_news.full"));
        assert_eq!(q.param("window_days"), Some(&ParamValue::Int64(30)));
    }
}

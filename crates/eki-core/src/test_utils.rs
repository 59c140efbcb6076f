//! Test utilities for eki-core
//!
//! A mock BigQuery REST server answering `jobs.query` with canned result
//! sets, picked by looking at the submitted SQL. Used to exercise the real
//! `BigQueryBackend` request/response path without a cloud project.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// Mock BigQuery server for integration tests
pub struct MockBigQueryServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Clone)]
struct ServerState {
    requests: Arc<Mutex<Vec<Value>>>,
    fail_with: Option<StatusCode>,
}

impl MockBigQueryServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_inner(None).await
    }

    /// Start a server that answers every query with `status`
    pub async fn start_failing(status: StatusCode) -> Self {
        Self::start_inner(Some(status)).await
    }

    async fn start_inner(fail_with: Option<StatusCode>) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            requests: requests.clone(),
            fail_with,
        };
        let app = Router::new()
            .route("/projects/:project/queries", post(handle_query))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// API base URL to hand to `BigQueryBackend::new`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockBigQueryServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// TCP listener that accepts connections and never answers
///
/// Requests against it only finish when the caller gives up.
pub struct StalledServer {
    addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl StalledServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self { addr, task }
    }

    /// API base URL to hand to `BigQueryBackend::new`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for StalledServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn field(name: &str, ty: &str) -> Value {
    json!({"name": name, "type": ty})
}

fn result(fields: Vec<Value>, rows: Vec<Vec<Value>>) -> Value {
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|cells| json!({"f": cells.into_iter().map(|v| json!({"v": v})).collect::<Vec<_>>()}))
        .collect();
    json!({
        "kind": "bigquery#queryResponse",
        "jobComplete": true,
        "schema": {"fields": fields},
        "totalRows": rows.len().to_string(),
        "rows": rows,
    })
}

/// `jobs.query` endpoint
async fn handle_query(
    State(state): State<ServerState>,
    Path(_project): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(body.clone());

    if let Some(status) = state.fail_with {
        return (
            status,
            Json(json!({"error": {"code": status.as_u16(), "message": "mock failure"}})),
        );
    }

    let sql = body["query"].as_str().unwrap_or_default();
    (StatusCode::OK, Json(canned_response(sql)))
}

/// Pick a result set by the shape of the SQL
fn canned_response(sql: &str) -> Value {
    if sql.contains("ML.GENERATE_EMBEDDING") {
        let mut embedding = field("embedding", "FLOAT");
        embedding["mode"] = json!("REPEATED");
        result(
            vec![embedding],
            vec![vec![json!([{"v": "0.6"}, {"v": "0.8"}])]],
        )
    } else if sql.contains("VECTOR_SEARCH") {
        result(
            vec![
                field("knowledge_id", "STRING"),
                field("content", "STRING"),
                field("similarity", "FLOAT"),
            ],
            vec![
                vec![json!("kb-1"), json!("Q3 revenue grew 23%"), json!("0.91")],
                vec![json!("kb-2"), json!("Office plants were watered"), json!("0.42")],
            ],
        )
    } else if sql.contains("ML.FORECAST") {
        result(
            vec![
                field("forecast_timestamp", "TIMESTAMP"),
                field("forecast_value", "FLOAT"),
                field("prediction_interval_lower_bound", "FLOAT"),
                field("prediction_interval_upper_bound", "FLOAT"),
            ],
            (0..3)
                .map(|day| {
                    let ts = 1_731_715_200 + day * 86_400;
                    vec![
                        json!(format!("{}.0", ts)),
                        json!("100.0"),
                        json!("95.0"),
                        json!("105.0"),
                    ]
                })
                .collect(),
        )
    } else if sql.contains("relevance_score") {
        result(
            vec![
                field("insight_id", "STRING"),
                field("content", "STRING"),
                field("confidence_score", "FLOAT"),
                field("business_impact_score", "FLOAT"),
                field("generated_timestamp", "TIMESTAMP"),
                field("relevance_score", "FLOAT"),
            ],
            vec![vec![
                json!("ins-1"),
                json!("Churn is down"),
                json!("0.9"),
                json!("0.7"),
                json!("1731715200.0"),
                json!("0.8"),
            ]],
        )
    } else if sql.contains("ML.GENERATE_TEXT") {
        result(
            vec![field("generated_text", "STRING")],
            vec![vec![json!("Mock generated insight")]],
        )
    } else if sql.contains("'total_insights'") {
        result(
            vec![field("metric_name", "STRING"), field("metric_value", "FLOAT")],
            vec![
                vec![json!("total_insights"), json!("4")],
                vec![json!("avg_confidence"), json!("0.88")],
            ],
        )
    } else if sql.contains("ORDER BY business_impact_score DESC") {
        result(
            vec![
                field("insight_id", "STRING"),
                field("content", "STRING"),
                field("business_impact_score", "FLOAT"),
                field("generated_timestamp", "TIMESTAMP"),
            ],
            vec![vec![
                json!("ins-2"),
                json!("Pipeline coverage improved"),
                json!("0.95"),
                json!("1731715200.0"),
            ]],
        )
    } else if sql.contains("AS content_category") {
        result(
            vec![
                field("content_category", "STRING"),
                field("post_count", "STRING"),
                field("avg_score", "FLOAT"),
                field("performance_tier", "STRING"),
                field("market_potential", "STRING"),
            ],
            vec![vec![
                json!("AI_TECH"),
                json!("142"),
                json!("24.5"),
                json!("HIGH_PERFORMANCE"),
                json!("HIGH_POTENTIAL"),
            ]],
        )
    } else if sql.starts_with("MERGE") {
        json!({"kind": "bigquery#queryResponse", "jobComplete": true, "numDmlAffectedRows": "1"})
    } else {
        result(vec![field("ok", "INTEGER")], vec![vec![json!("1")]])
    }
}

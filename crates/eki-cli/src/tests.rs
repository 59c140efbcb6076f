//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use eki_core::models::PersonalizedInsight;
use eki_core::notebook::template_lines;
use eki_core::test_utils::{MockBigQueryServer, StalledServer};
use eki_core::{
    BigQueryBackend, EngineClient, EngineConfig, InsightOrchestrator, MockEngine, TriggerCategory,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::cli::{Cli, Commands, NotebookAction, SqlAction};
use crate::commands::{self, truncate};

fn setup_orchestrator(mock: &MockEngine) -> InsightOrchestrator {
    let config = EngineConfig::with_project("test-project").unwrap();
    InsightOrchestrator::new(EngineClient::mock(mock.clone()), config)
}

fn write_notebook(dir: &TempDir, name: &str, cells: Vec<Value>) -> PathBuf {
    let path = dir.path().join(name);
    let doc = json!({
        "cells": cells,
        "metadata": {"kernelspec": {"name": "python3"}},
        "nbformat": 4,
        "nbformat_minor": 5
    });
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    path
}

fn read_cells(path: &Path) -> Vec<Value> {
    let doc: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    doc["cells"].as_array().unwrap().clone()
}

fn code_cell(lines: &[&str]) -> Value {
    json!({
        "cell_type": "code",
        "execution_count": null,
        "metadata": {},
        "outputs": [],
        "source": lines
    })
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_notebook_patch() {
    let cli = Cli::try_parse_from(["eki", "notebook", "patch", "a.ipynb", "b.ipynb", "--dry-run"])
        .unwrap();
    match cli.command {
        Commands::Notebook {
            action: NotebookAction::Patch { files, dry_run },
        } => {
            assert_eq!(files, vec![PathBuf::from("a.ipynb"), PathBuf::from("b.ipynb")]);
            assert!(dry_run);
        }
        _ => panic!("expected notebook patch"),
    }
}

#[test]
fn test_parse_forecast_defaults() {
    let cli = Cli::try_parse_from(["eki", "forecast", "revenue"]).unwrap();
    match cli.command {
        Commands::Forecast {
            metric,
            horizon,
            confidence,
        } => {
            assert_eq!(metric, "revenue");
            assert_eq!(horizon, 30);
            assert_eq!(confidence, 0.95);
        }
        _ => panic!("expected forecast"),
    }
}

#[test]
fn test_parse_insight_with_context() {
    let cli = Cli::try_parse_from([
        "eki",
        "-v",
        "insight",
        "revenue trends",
        "--audience",
        "executive",
        "--context",
        "region=emea",
        "--context",
        "quarter=3",
    ])
    .unwrap();
    assert!(cli.verbose);
    match cli.command {
        Commands::Insight {
            query,
            role,
            audience,
            context,
        } => {
            assert_eq!(query, "revenue trends");
            assert_eq!(role, "analyst");
            assert_eq!(audience.as_deref(), Some("executive"));
            assert_eq!(context, vec!["region=emea", "quarter=3"]);
        }
        _ => panic!("expected insight"),
    }
}

#[test]
fn test_parse_sql_and_classify() {
    let cli = Cli::try_parse_from(["eki", "sql", "content-analysis", "--days", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sql {
            action: SqlAction::ContentAnalysis { days: 7, run: false }
        }
    ));

    // --post-count needs --avg-score
    assert!(Cli::try_parse_from(["eki", "classify", "title", "--post-count", "5"]).is_err());
    assert!(Cli::try_parse_from(["eki", "classify"]).is_err());
}

// ========== Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer sentence", 10), "a longe...");
    // Multi-byte characters are not split
    assert_eq!(truncate("éééééééééééé", 5), "éé...");
}

#[test]
fn test_parse_context() {
    let pairs = vec![
        "region=emea".to_string(),
        "quarter=3".to_string(),
        "flags=[\"a\"]".to_string(),
        "note=a=b".to_string(),
    ];
    let context = commands::parse_context(&pairs).unwrap();
    assert_eq!(context["region"], json!("emea"));
    assert_eq!(context["quarter"], json!(3));
    assert_eq!(context["flags"], json!(["a"]));
    assert_eq!(context["note"], json!("a=b"));

    assert!(commands::parse_context(&["novalue".to_string()]).is_err());
    assert!(commands::parse_context(&["=x".to_string()]).is_err());
}

#[test]
fn test_load_engine_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::load_engine_config(Some(&dir.path().join("missing.toml")));
    assert!(result.is_err());
}

// ========== Notebook Command Tests ==========

#[test]
fn test_cmd_notebook_patch_rewrites_matching_cells() {
    let dir = TempDir::new().unwrap();
    let path = write_notebook(
        &dir,
        "demo.ipynb",
        vec![
            json!({"cell_type": "markdown", "metadata": {}, "source": ["# client = bigquery.Client()\n"]}),
            code_cell(&["from google.cloud import bigquery\n", "client = bigquery.Client()\n"]),
            code_cell(&["print('untouched')\n"]),
            code_cell(&["def analyze_content_patterns():\n", "    pass\n"]),
        ],
    );

    commands::cmd_notebook_patch(&[path.clone()], false).unwrap();

    let cells = read_cells(&path);
    assert_eq!(cells.len(), 4);
    // Markdown is never patched
    assert_eq!(cells[0]["source"], json!(["# client = bigquery.Client()\n"]));
    assert_eq!(
        cells[1]["source"],
        json!(template_lines(TriggerCategory::CredentialSetup))
    );
    assert_eq!(cells[2]["source"], json!(["print('untouched')\n"]));
    assert_eq!(
        cells[3]["source"],
        json!(template_lines(TriggerCategory::ContentAnalysis))
    );
}

#[test]
fn test_cmd_notebook_patch_dry_run_leaves_file() {
    let dir = TempDir::new().unwrap();
    let path = write_notebook(
        &dir,
        "demo.ipynb",
        vec![code_cell(&["project = 'your-bigquery-project-id'\n"])],
    );
    let before = fs::read_to_string(&path).unwrap();

    commands::cmd_notebook_patch(&[path.clone()], true).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_cmd_notebook_patch_invalid_json_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.ipynb");
    fs::write(&path, "{ not json").unwrap();

    let result = commands::cmd_notebook_patch(&[path.clone()], false);
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_cmd_notebook_rewrite_models() {
    let dir = TempDir::new().unwrap();
    let path = write_notebook(
        &dir,
        "models.ipynb",
        vec![code_cell(&[
            "q = \"SELECT AI.GENERATE_DOUBLE(MODEL `proj.ds.gemini`, prompt)\"\n",
        ])],
    );

    commands::cmd_notebook_rewrite_models(&[path.clone()], false).unwrap();

    let cells = read_cells(&path);
    let source: String = cells[0]["source"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l.as_str().unwrap())
        .collect();
    assert!(source.contains("AI.GENERATE_DOUBLE(proj.ds.gemini, prompt)"));
    assert!(!source.contains("MODEL `"));
}

#[test]
fn test_cmd_notebook_triggers() {
    assert!(commands::cmd_notebook_triggers().is_ok());
}

// ========== Orchestrator Command Tests ==========

#[tokio::test]
async fn test_cmd_insight() {
    let mock = MockEngine::new()
        .with_record("kb-1", "Revenue grew 23%", 0.9, &["analyst"])
        .with_generated_text("Revenue is up");
    let orchestrator = setup_orchestrator(&mock);

    let result = commands::cmd_insight(
        &orchestrator,
        "revenue trends",
        "analyst",
        Some("executive"),
        &["region=emea".to_string()],
    )
    .await;
    assert!(result.is_ok());

    let prompts = mock.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Revenue grew 23%"));
    assert!(prompts[0].contains("Audience role: executive"));
    assert!(prompts[0].ends_with("Additional context: region=emea"));
}

#[tokio::test]
async fn test_cmd_insight_not_found_is_not_an_error() {
    let mock = MockEngine::new().with_record("kb-1", "Executive memo", 0.9, &["executive"]);
    let orchestrator = setup_orchestrator(&mock);

    // Analyst cannot see the only record
    let result = commands::cmd_insight(&orchestrator, "revenue", "analyst", None, &[]).await;
    assert!(result.is_ok());
    assert!(mock.prompts().is_empty());
}

#[tokio::test]
async fn test_cmd_insight_bad_context_fails_before_engine() {
    let mock = MockEngine::demo();
    let orchestrator = setup_orchestrator(&mock);

    let result = commands::cmd_insight(
        &orchestrator,
        "revenue",
        "analyst",
        None,
        &["missing-separator".to_string()],
    )
    .await;
    assert!(result.is_err());
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_cmd_forecast() {
    let mock = MockEngine::new();
    let orchestrator = setup_orchestrator(&mock);

    assert!(commands::cmd_forecast(&orchestrator, "revenue", 7, 0.95)
        .await
        .is_ok());
    assert!(commands::cmd_forecast(&orchestrator, "bad metric", 7, 0.95)
        .await
        .is_err());
    assert!(commands::cmd_forecast(&orchestrator, "revenue", 0, 0.95)
        .await
        .is_err());
}

#[tokio::test]
async fn test_cmd_personalized_and_dashboard() {
    let mock = MockEngine::demo().with_personalized_insight(
        PersonalizedInsight {
            insight_id: "ins-x".into(),
            content: "Pipeline coverage improved".into(),
            confidence_score: 0.8,
            business_impact_score: 0.9,
            relevance_score: 0.7,
            generated_timestamp: Utc::now() - ChronoDuration::hours(2),
        },
        &["analyst"],
    );
    let orchestrator = setup_orchestrator(&mock);

    assert!(commands::cmd_personalized(&orchestrator, "analyst", 5)
        .await
        .is_ok());
    assert!(commands::cmd_personalized(&orchestrator, "analyst", 0)
        .await
        .is_err());
    assert!(commands::cmd_dashboard(&orchestrator).await.is_ok());
}

// ========== SQL / Classify Command Tests ==========

#[tokio::test]
async fn test_cmd_sql_content_analysis_prints_without_config() {
    assert!(commands::cmd_sql_content_analysis(None, 30, false)
        .await
        .is_ok());
    assert!(commands::cmd_sql_content_analysis(None, 0, false)
        .await
        .is_err());
}

fn bigquery_orchestrator(api_base: &str) -> InsightOrchestrator {
    let mut config = EngineConfig::with_project("test-project").unwrap();
    config.request_timeout = std::time::Duration::from_millis(200);
    config.max_retries = 0;
    let backend = BigQueryBackend::new(&config, api_base, "token");
    InsightOrchestrator::new(EngineClient::BigQuery(backend), config)
}

#[tokio::test]
async fn test_run_content_analysis() {
    let server = MockBigQueryServer::start().await;
    let orchestrator = bigquery_orchestrator(&server.url());

    assert!(commands::run_content_analysis(&orchestrator, 7).await.is_ok());
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["queryParameters"][0]["parameterValue"]["value"], "7");
}

#[tokio::test]
async fn test_run_content_analysis_stalled_engine_fails() {
    let server = StalledServer::start().await;
    let orchestrator = bigquery_orchestrator(&server.url());

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        commands::run_content_analysis(&orchestrator, 30),
    )
    .await
    .expect("content analysis must respect the request timeout");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_content_analysis_needs_bigquery() {
    let mock = MockEngine::new();
    let orchestrator = setup_orchestrator(&mock);

    assert!(commands::run_content_analysis(&orchestrator, 30).await.is_err());
    assert_eq!(mock.calls(), 0);
}

#[test]
fn test_cmd_classify() {
    let titles = vec![
        "Show HN: a GPT wrapper".to_string(),
        "Bitcoin is back".to_string(),
    ];
    assert!(commands::cmd_classify(&titles, Some(21.0), Some(120)).is_ok());
    assert!(commands::cmd_classify(&titles, None, None).is_ok());
}

//! Integration tests for the `/api/v1/jobs` and `/api/v1/logs` routes.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use common::{body_json, build_test_app, pipeline};
use serde_json::json;

use flowtrack_engine::testing::{event, finished_event, log_line, LogScript, ScriptedEngine, WatchScript};
use flowtrack_engine::EngineError;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_201_and_job_is_immediately_readable() {
    let engine = ScriptedEngine::new()
        .with_watches([WatchScript::EventsThenHang(vec![])])
        .with_logs([LogScript::LinesThenHang(vec![])]);
    let app = build_test_app(engine);

    let response = app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["job_id"], "ci-abc");

    let response = app.get("/api/v1/jobs/ci-abc").await;
    assert_eq!(response.status(), StatusCode::OK);
    let job = &body_json(response).await["data"];
    assert_eq!(job["id"], "ci-abc");
    assert_eq!(job["status"], "Running");
    assert!(job["cost"].is_string());

    // Nothing observed yet, so no phase is reported.
    assert_eq!(job["phase_list"], json!([]));

    app.service.tracker().shutdown().await;
}

#[tokio::test]
async fn malformed_body_returns_400() {
    let app = build_test_app(ScriptedEngine::new());
    let response = app.post_raw("/api/v1/jobs", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert!(app.engine.submitted().is_empty());
}

#[tokio::test]
async fn workflow_with_empty_stage_is_rejected() {
    let app = build_test_app(ScriptedEngine::new());
    let workflow = json!({
        "metadata": {"name": "ci-abc"},
        "spec": {"templates": [{"name": "main", "steps": [[{"name": "a"}], []]}]}
    });

    let response = app.post_json("/api/v1/jobs", &workflow).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(app.engine.submitted().is_empty());
}

#[tokio::test]
async fn engine_rejection_returns_400() {
    let engine = ScriptedEngine::new();
    engine.fail_next_submit(EngineError::Api {
        status: 409,
        body: "workflow already exists".into(),
    });
    let app = build_test_app(engine);

    let response = app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ENGINE_REJECTED");
    assert!(json["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn engine_outage_returns_502() {
    let engine = ScriptedEngine::new();
    engine.fail_next_submit(EngineError::Api {
        status: 503,
        body: "upstream connect error".into(),
    });
    let app = build_test_app(engine);

    let response = app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "ENGINE_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("upstream"));
}

// ---------------------------------------------------------------------------
// Get / delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finished_job_reports_phases_in_order() {
    let engine = ScriptedEngine::new().with_watches([WatchScript::Events(vec![
        Ok(event("ci-abc", "Running", &[("ci-abc-1", "checkout")])),
        Ok(finished_event(
            "ci-abc",
            "Failed",
            &[("ci-abc-1", "checkout"), ("ci-abc-2", "build")],
            Utc::now(),
        )),
    ])]);
    let app = build_test_app(engine);

    app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;
    app.wait_until_idle().await;

    let job = &body_json(app.get("/api/v1/jobs/ci-abc").await).await["data"];
    assert_eq!(job["status"], "Failed");
    let phases = job["phase_list"].as_array().unwrap();
    assert_eq!(phases[0]["pod_name"], "ci-abc-1");
    assert_eq!(phases[1]["pod_name"], "ci-abc-2");
    assert_eq!(phases[2]["name"], "deploy");
    assert_eq!(phases[2]["pod_name"], "");
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = build_test_app(ScriptedEngine::new());
    let response = app.get("/api/v1/jobs/no-such-job").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with id no-such-job not found");
}

#[tokio::test]
async fn invalid_job_id_returns_400() {
    let app = build_test_app(ScriptedEngine::new());

    let response = app.get("/api/v1/jobs/ab").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = app.delete("/api/v1/jobs/ci*").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_returns_204_and_removes_the_job() {
    let engine = ScriptedEngine::new()
        .with_watches([WatchScript::EventsThenHang(vec![])])
        .with_logs([LogScript::LinesThenHang(vec![])]);
    let app = build_test_app(engine);

    app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;

    let response = app.delete("/api/v1/jobs/ci-abc").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!app.service.tracker().registry().is_tracking("ci-abc").await);

    let response = app.get("/api/v1/jobs/ci-abc").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// List / search
// ---------------------------------------------------------------------------

async fn submit_all(app: &common::TestApp, names: &[&str]) {
    for name in names {
        let response = app.post_json("/api/v1/jobs", &pipeline(name)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    app.wait_until_idle().await;
}

fn ids(json: &serde_json::Value) -> Vec<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn list_is_most_recent_first_and_limited() {
    let app = build_test_app(ScriptedEngine::new());
    submit_all(&app, &["ci-one", "ci-two", "ci-three"]).await;

    let json = body_json(app.get("/api/v1/jobs").await).await;
    assert_eq!(ids(&json), ["ci-three", "ci-two", "ci-one"]);
    let first = &json["data"][0];
    assert!(first["start"].is_string());
    assert!(first["end"].is_string());
    assert!(first["status"].is_string());

    let json = body_json(app.get("/api/v1/jobs?limit=2").await).await;
    assert_eq!(ids(&json), ["ci-three", "ci-two"]);

    let json = body_json(app.get("/api/v1/jobs?size=1").await).await;
    assert_eq!(ids(&json), ["ci-three"]);

    // Unusable limits fall back to the default.
    for query in ["limit=0", "limit=-3", "limit=many"] {
        let json = body_json(app.get(&format!("/api/v1/jobs?{query}")).await).await;
        assert_eq!(ids(&json).len(), 3, "query {query}");
    }
}

#[tokio::test]
async fn keyword_filter_is_case_insensitive() {
    let app = build_test_app(ScriptedEngine::new());
    submit_all(&app, &["api-build-1", "web-deploy-2", "api-deploy-3"]).await;

    let json = body_json(app.get("/api/v1/jobs?keyword=API").await).await;
    assert_eq!(ids(&json), ["api-deploy-3", "api-build-1"]);

    let json = body_json(app.get("/api/v1/jobs/search?keyword=deploy").await).await;
    assert_eq!(ids(&json), ["api-deploy-3", "web-deploy-2"]);

    let json = body_json(app.get("/api/v1/jobs/search").await).await;
    assert_eq!(ids(&json).len(), 3);
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logs_are_served_per_execution_unit() {
    let engine = ScriptedEngine::new()
        .with_watches([WatchScript::Events(vec![Ok(finished_event(
            "ci-abc",
            "Succeeded",
            &[("ci-abc-1", "checkout"), ("ci-abc-2", "build")],
            Utc::now(),
        ))])])
        .with_logs([LogScript::Lines(vec![
            Ok(log_line("ci-abc-1", "cloning")),
            Ok(log_line("ci-abc-2", "compiling")),
            Ok(log_line("ci-abc-2", "linking")),
        ])]);
    let app = build_test_app(engine);

    app.post_json("/api/v1/jobs", &pipeline("ci-abc")).await;
    app.wait_until_idle().await;

    let json = body_json(app.get("/api/v1/logs/ci-abc-2").await).await;
    let lines: Vec<_> = json["data"].as_array().unwrap().iter().map(|l| l.as_str().unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" compiling"));
    assert!(lines[1].ends_with(" linking"));

    let json = body_json(app.get("/api/v1/logs/ci-abc-1").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_unit_has_empty_log() {
    let app = build_test_app(ScriptedEngine::new());
    let response = app.get("/api/v1/logs/nobody-0").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[tokio::test]
async fn invalid_unit_id_returns_400() {
    let app = build_test_app(ScriptedEngine::new());
    let response = app.get("/api/v1/logs/pod:1").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

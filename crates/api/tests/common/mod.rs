#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use flowtrack_api::config::ServerConfig;
use flowtrack_api::router::build_app_router;
use flowtrack_api::state::AppState;
use flowtrack_core::backoff::BackoffPolicy;
use flowtrack_engine::testing::ScriptedEngine;
use flowtrack_store::{JobRecordStore, MemoryKvStore};
use flowtrack_tracker::{JobService, JobTracker, TrackerConfig};

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<ScriptedEngine>,
    pub service: JobService,
}

/// Build the full application router over the scripted engine and an
/// in-memory record store.
pub fn build_test_app(engine: ScriptedEngine) -> TestApp {
    let engine = Arc::new(engine);
    let records = JobRecordStore::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(3600));
    let tracker_config = TrackerConfig {
        log_drain_grace: Duration::from_millis(100),
        cancel_timeout: Duration::from_secs(2),
        reopen: BackoffPolicy::immediate(),
        ..Default::default()
    };
    let tracker = Arc::new(JobTracker::new(engine.clone(), records.clone(), tracker_config));
    let service = JobService::new(engine.clone(), records, tracker);

    let state = AppState {
        service: service.clone(),
    };

    TestApp {
        router: build_app_router(state, &ServerConfig::default()),
        engine,
        service,
    }
}

impl TestApp {
    /// Wait until no job is being tracked anymore.
    pub async fn wait_until_idle(&self) {
        for _ in 0..200 {
            if self.service.tracker().registry().active().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("tracking did not finish");
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        send(&self.router, Method::GET, uri, Body::empty()).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        send(&self.router, Method::DELETE, uri, Body::empty()).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> Response<Body> {
        send(&self.router, Method::POST, uri, Body::from(body.to_string())).await
    }

    pub async fn post_raw(&self, uri: &str, body: &'static str) -> Response<Body> {
        send(&self.router, Method::POST, uri, Body::from(body)).await
    }

    pub async fn put_json(&self, uri: &str, body: &Value) -> Response<Body> {
        send(&self.router, Method::PUT, uri, Body::from(body.to_string())).await
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

/// Read the full response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// A three-stage pipeline named `name`; the second stage runs two steps
/// in parallel.
pub fn pipeline(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {
            "entrypoint": "main",
            "templates": [{"name": "main", "steps": [
                [{"name": "checkout"}],
                [{"name": "build"}, {"name": "lint"}],
                [{"name": "deploy"}]
            ]}]
        }
    })
}

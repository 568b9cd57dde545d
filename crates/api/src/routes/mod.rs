pub mod applications;
pub mod health;
pub mod jobs;
pub mod logs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                 list (GET), submit (POST)
/// /jobs/search          keyword search (GET)
/// /jobs/{id}            get (GET), delete (DELETE)
///
/// /logs/{unit_id}       stored log lines of one execution unit (GET)
///
/// /applications         registered definitions (GET)
/// /applications/{id}    get (GET), register or replace (PUT), delete (DELETE)
/// /applications/{id}/jobs  start a job on a branch (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/applications", applications::router())
        .nest("/jobs", jobs::router())
        .nest("/logs", logs::router())
}

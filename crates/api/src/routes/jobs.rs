//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// POST   /                -> submit_job
/// GET    /search          -> search_jobs
/// GET    /{id}            -> get_job
/// DELETE /{id}            -> delete_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/search", get(jobs::search_jobs))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
}

//! Handlers for the `/jobs` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use flowtrack_core::workflow::Workflow;
use flowtrack_tracker::directory::{effective_limit, DEFAULT_LIST_LIMIT};

use crate::error::{AppError, AppResult};
use crate::response::{CreateJobResponse, DataResponse, JobDetail, JobSummary};
use crate::state::AppState;

/// Query parameters for `GET /jobs`.
///
/// `limit` is kept raw so that unparsable values fall back to the
/// default instead of failing the request. `size` is an alias.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub keyword: Option<String>,
    pub limit: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchJobsQuery {
    pub keyword: Option<String>,
}

/// POST /api/v1/jobs
///
/// Submit a workflow definition. Returns 201 once the engine accepted it
/// and its initial snapshot is stored.
pub async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<Workflow>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(workflow) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let job_id = state.service.submit_job(workflow).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreateJobResponse { job_id },
        }),
    ))
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = effective_limit(params.limit.as_deref().or(params.size.as_deref()));
    let keyword = params.keyword.unwrap_or_default();
    list(&state, &keyword, limit).await
}

/// GET /api/v1/jobs/search
pub async fn search_jobs(
    State(state): State<AppState>,
    Query(params): Query<SearchJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let keyword = params.keyword.unwrap_or_default();
    list(&state, &keyword, DEFAULT_LIST_LIMIT).await
}

async fn list(
    state: &AppState,
    keyword: &str,
    limit: usize,
) -> AppResult<Json<DataResponse<Vec<JobSummary>>>> {
    let jobs = state.service.list_jobs(keyword, limit).await?;
    let data: Vec<JobSummary> = jobs.into_iter().map(JobSummary::from).collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/jobs/{id}
///
/// A one-shot read of the stored snapshot, phases in workflow order.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.get_job(&job_id).await?;
    Ok(Json(DataResponse {
        data: JobDetail::from(job),
    }))
}

/// DELETE /api/v1/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<StatusCode> {
    state.service.delete_job(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Handlers for the `/applications` resource.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use flowtrack_core::workflow::Workflow;

use crate::error::{AppError, AppResult};
use crate::response::{CreateJobResponse, DataResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub branch: String,
}

/// GET /api/v1/applications
pub async fn list_applications(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let ids: Vec<String> = state.service.list_applications().await?.into_iter().collect();
    Ok(Json(DataResponse { data: ids }))
}

/// PUT /api/v1/applications/{id}
///
/// Register the workflow definition under `id`, replacing any previous
/// one. Its `metadata.generateName` must match the id.
pub async fn save_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Workflow>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(workflow) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    state.service.save_application(&id, workflow).await?;
    Ok(Json(DataResponse { data: id }))
}

/// GET /api/v1/applications/{id}
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let workflow = state.service.get_application(&id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// DELETE /api/v1/applications/{id}
pub async fn delete_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.service.delete_application(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/applications/{id}/jobs?branch=...
///
/// Start a job from the registered definition, building `branch`.
pub async fn run_application(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<RunQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(RunQuery { branch }) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let job_id = state.service.submit_from_application(&id, &branch).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreateJobResponse { job_id },
        }),
    ))
}

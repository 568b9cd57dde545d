use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/logs/{unit_id}
///
/// Stored lines of one execution unit, oldest first. An unknown unit has
/// an empty log.
pub async fn get_log(
    State(state): State<AppState>,
    Path(unit_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let lines = state.service.get_log(&unit_id).await?;
    Ok(Json(DataResponse { data: lines }))
}

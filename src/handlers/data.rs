use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::Result,
    models::{attendance::AttendanceRecord, sync::CachedData},
    repositories::attendance as attendance_repo,
    services::{auth as auth_service, sync as sync_service},
    state::AppState,
};

/// Everything in the local cache.
#[axum::debug_handler]
pub async fn get_data(State(state): State<AppState>) -> Result<Json<CachedData>> {
    Ok(Json(sync_service::load_snapshot(&state).await?))
}

/// Cached attendance rows for one month tag.
#[axum::debug_handler]
pub async fn attendance_for_month(
    State(state): State<AppState>,
    Path(month): Path<String>,
) -> Result<Json<Vec<AttendanceRecord>>> {
    let rows = attendance_repo::get_attendance_by_month(state.store.as_ref(), &month).await?;
    Ok(Json(rows))
}

/// Wipes the local cache, session and key material included.
#[axum::debug_handler]
pub async fn reset_data(State(state): State<AppState>) -> Result<Response> {
    auth_service::reset_all(&state).await?;
    Ok((StatusCode::OK, Json(sonic_rs::json!({ "success": true }))).into_response())
}

use axum::{
    extract::State,
    http::{Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    handlers::proxy::client_address,
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

/// The request payload for portal login.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// The response payload for session checks.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub is_valid: bool,
}

/// Handles portal login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt - Payload: {:?}", payload);
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    let state = state.for_client(&client_address(&headers, &extensions));
    let result = auth_service::login(
        &state,
        payload.username.trim(),
        &payload.password,
        payload.remember_me,
    )
    .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    Ok((status, Json(result)).into_response())
}

/// Handles logout. Always succeeds locally.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Response {
    let state = state.for_client(&client_address(&headers, &extensions));
    auth_service::logout(&state).await;
    (StatusCode::OK, Json(sonic_rs::json!({ "success": true }))).into_response()
}

/// Reports whether a stored session exists and the portal still accepts it.
#[axum::debug_handler]
pub async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Result<Json<SessionResponse>> {
    let state = state.for_client(&client_address(&headers, &extensions));
    let session = auth_service::check_stored_session(&state).await?;
    Ok(Json(SessionResponse {
        is_valid: session.is_some(),
    }))
}

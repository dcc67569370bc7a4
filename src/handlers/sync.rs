use axum::{
    extract::State,
    http::{Extensions, HeaderMap},
    Json,
};
use serde::Deserialize;

use crate::{
    error::Result,
    handlers::proxy::client_address,
    models::sync::{SyncReport, SyncSnapshot},
    services::{auth as auth_service, sync as sync_service},
    state::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub cookies: Option<String>,
}

/// Runs a sync with the given cookies, or with the stored session when none are sent.
#[axum::debug_handler]
pub async fn sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    payload: Option<Json<SyncRequest>>,
) -> Result<Json<SyncReport>> {
    let state = state.for_client(&client_address(&headers, &extensions));
    let requested = payload.and_then(|Json(p)| p.cookies).filter(|c| !c.is_empty());

    let cookies = match requested {
        Some(cookies) => Some(cookies),
        None => auth_service::get_stored_session(&state)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Stored session unavailable for sync: {}", e);
                None
            })
            .map(|s| s.cookies),
    };

    Ok(Json(sync_service::sync(&state, cookies.as_deref()).await))
}

#[axum::debug_handler]
pub async fn status(State(state): State<AppState>) -> Result<Json<SyncSnapshot>> {
    Ok(Json(sync_service::status(&state).await?))
}

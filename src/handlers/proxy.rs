use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{error::AppError, models::proxy::ProxyRequest, state::AppState};

/// Identifies the caller for rate limiting.
///
/// Proxy headers win over the socket peer so clients behind one reverse proxy
/// are still told apart.
pub(crate) fn client_address(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Forwards one call to the portal.
#[axum::debug_handler]
pub async fn proxy(
    State(state): State<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(request): Json<ProxyRequest>,
) -> Response {
    let client = client_address(&headers, &extensions);

    match state.gateway.proxy(&client, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e @ (AppError::InvalidTarget(_) | AppError::RateLimited(_))) => e.into_response(),
        Err(e) => {
            tracing::error!("❌ Proxy error for {}: {}", request.target_path, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(sonic_rs::json!({ "error": "Failed to proxy request" })),
            )
                .into_response()
        }
    }
}

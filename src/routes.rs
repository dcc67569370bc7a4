use axum::{
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{
    error::{AppError, Result},
    handlers,
    state::AppState,
};

fn allow_origin(origin: &str) -> Result<AllowOrigin> {
    if origin == "*" {
        return Ok(AllowOrigin::any());
    }
    let value = HeaderValue::from_str(origin)
        .map_err(|_| AppError::Validation(format!("Invalid APP_URL origin: {}", origin)))?;
    Ok(AllowOrigin::exact(value))
}

/// Builds the service router.
pub fn app(state: AppState) -> Result<Router> {
    let origin = allow_origin(&state.config.allowed_origin)?;

    let gateway_cors = CorsLayer::new()
        .allow_origin(origin.clone())
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let engine_cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let gateway_routes = Router::new()
        .route("/api/proxy", post(handlers::proxy::proxy))
        .layer(gateway_cors)
        .with_state(state.clone());

    let engine_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/session", get(handlers::auth::session))
        .route("/api/sync", post(handlers::sync::sync))
        .route("/api/sync/status", get(handlers::sync::status))
        .route(
            "/api/data",
            get(handlers::data::get_data).delete(handlers::data::reset_data),
        )
        .route(
            "/api/data/attendance/{month}",
            get(handlers::data::attendance_for_month),
        )
        .layer(engine_cors)
        .with_state(state);

    Ok(Router::new()
        .merge(gateway_routes)
        .merge(engine_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        ))
}

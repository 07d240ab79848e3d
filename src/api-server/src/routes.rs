//! Route definitions for the API server
//!
//! - `POST /allowed` authorization checks
//! - `POST /__reload__` policy reload
//! - `GET /__heartbeat__`, `/__lbheartbeat__`, `/__version__` operations

use crate::{handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    let client_ip = middleware::ClientIpConfig {
        trust_forwarded_for: state.trust_forwarded_for,
    };

    Router::new()
        .route("/allowed", post(handlers::allowed))
        .route("/__reload__", post(handlers::reload))
        .route("/__heartbeat__", get(handlers::heartbeat))
        .route("/__lbheartbeat__", get(handlers::lbheartbeat))
        .route("/__version__", get(handlers::version_info))
        .with_state(state)
        // Executed bottom to top
        .layer(axum_middleware::from_fn_with_state(
            client_ip,
            middleware::client_ip_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

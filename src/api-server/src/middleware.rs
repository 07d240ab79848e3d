//! Middleware layer for the API server
//!
//! - Request ID tracking
//! - Request logging
//! - Client address resolution

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Forwarded client address header name
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the calling client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// How the client address is resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpConfig {
    /// Honor `x-forwarded-for`; only safe behind a proxy that overwrites it
    pub trust_forwarded_for: bool,
}

/// Request ID middleware
///
/// Reuses a valid incoming `x-request-id` or generates one, and echoes it in
/// the response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4);

    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Incoming request"
    );

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status().as_u16();
    let duration_ms = elapsed.as_millis() as u64;

    // `event!` needs a constant level
    match status {
        500..=599 => error!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        400..=499 => warn!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
        _ => info!(request_id = %request_id, method = %method, uri = %uri, status, duration_ms, "Request completed"),
    }

    response
}

/// Resolve the client address
///
/// The socket peer address is used unless forwarded-header trust is enabled,
/// in which case the first `x-forwarded-for` entry wins.
pub async fn client_ip_middleware(
    State(config): State<ClientIpConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let forwarded = config
        .trust_forwarded_for
        .then(|| request.headers().get(X_FORWARDED_FOR))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = forwarded.or(peer) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

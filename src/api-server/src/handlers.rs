use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::Result,
    middleware::ClientIp,
    models::*,
    state::AppState,
};
use warden_authz::{IdentityError, Request};

/// Context key the client address is exposed under
///
/// The address is the socket peer unless the server was started with
/// forwarded-header trust (see `ClientIpConfig`); only then can callers
/// influence it through `x-forwarded-for`.
pub const REMOTE_IP_KEY: &str = "remoteIP";

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Token of an `Authorization: Bearer <token>` header; the scheme is case-insensitive
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let (scheme, token) = header_str(headers, header::AUTHORIZATION)?.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim_start())
}

/// Authorization check
///
/// The audience is the `Origin` header. With a token verifier configured the
/// candidate principals come from the bearer token and body principals are
/// ignored.
pub async fn allowed(
    State(state): State<Arc<AppState>>,
    client: Option<Extension<ClientIp>>,
    headers: HeaderMap,
    payload: std::result::Result<Json<AllowedRequest>, JsonRejection>,
) -> Result<Json<AllowedResponse>> {
    let Json(body) = payload?;
    let origin = header_str(&headers, header::ORIGIN).filter(|o| !o.is_empty());

    let principals = match &state.identity {
        Some(identity) => identity.authenticate(bearer_token(&headers), origin).await?,
        None => body.principals,
    };
    let audience = origin.ok_or(IdentityError::MissingOrigin)?;

    // Only the resolved client address may populate `remoteIP`
    let mut context = body.context;
    context.remove(REMOTE_IP_KEY);
    if let Some(Extension(ClientIp(ip))) = client {
        context.insert(REMOTE_IP_KEY.to_string(), ip.to_string().into());
    }

    let request = Request {
        principals,
        resource: body.resource,
        action: body.action,
        context,
    };

    let (decision, principals) = state.engine.check_principals(audience, request);
    debug!(audience, allowed = decision.allowed, "authorization checked");

    Ok(Json(AllowedResponse {
        allowed: decision.allowed,
        principals,
    }))
}

/// Re-read all policy sources; all-or-nothing
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>> {
    state.reload().await?;
    info!(audiences = state.engine.registry().len(), "reload requested");
    Ok(Json(ReloadResponse { success: true }))
}

pub async fn heartbeat(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        audiences: state.engine.registry().len(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Load balancer health check; answers as long as the process serves
pub async fn lbheartbeat() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

pub async fn version_info(State(state): State<Arc<AppState>>) -> Json<VersionInfo> {
    Json(VersionInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: state.version.clone(),
    })
}

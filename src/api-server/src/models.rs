use serde::{Deserialize, Serialize};
use warden_authz::{deserialize_context, Context, Principals};

/// `POST /allowed` request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowedRequest {
    /// Candidate principals; ignored when identities come from bearer tokens
    #[serde(default)]
    pub principals: Principals,

    pub resource: String,

    pub action: String,

    #[serde(default, deserialize_with = "deserialize_context")]
    pub context: Context,
}

/// `POST /allowed` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedResponse {
    pub allowed: bool,

    /// Principals after tag expansion
    pub principals: Principals,
}

/// `POST /__reload__` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub success: bool,
}

/// Heartbeat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub audiences: usize,
    pub uptime_seconds: u64,
}

/// Version information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
}

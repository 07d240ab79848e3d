use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;
use warden_authz::{AuthzError, IdentityError, IdentityErrorKind};

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    Authz(#[from] AuthzError),

    /// Request body is missing, not JSON, or of the wrong shape
    #[error("Invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Identity(e) => match e.kind() {
                IdentityErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                IdentityErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                IdentityErrorKind::Forbidden => StatusCode::FORBIDDEN,
            },
            ApiError::Authz(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidBody(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        warn!(status = status.as_u16(), "{}", message);

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_status_mapping() {
        assert_eq!(ApiError::from(IdentityError::MissingOrigin).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(IdentityError::InvalidToken("expired".into())).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(IdentityError::AudienceMismatch("https://other/".into())).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_body_rejection_keeps_status() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let rejection = axum::Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();

        let error = ApiError::from(rejection);
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().starts_with("Invalid request body"));
    }

    #[test]
    fn test_load_error_is_internal() {
        let error = ApiError::from(AuthzError::EmptySource("policies.yaml".into()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

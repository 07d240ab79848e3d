//! Identity extraction from verified token claims
//!
//! A caller presents a signed token and declares the origin (audience) it is
//! calling for. Once a [`TokenVerifier`] has checked the token, the claims
//! are turned into principals:
//!
//! - `userid:<sub>` always
//! - `email:<email>` when the claim is present and non-empty
//! - `group:<g>` for each group, in claim order
//!
//! The declared origin must appear in the token audience.

use crate::principal::{Principal, Principals};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Claims extracted from a verified token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub", default)]
    pub subject: String,

    /// `aud` claim; a single string is accepted as a one-element list
    #[serde(rename = "aud", default, deserialize_with = "one_or_many")]
    pub audience: Vec<String>,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub groups: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(audience) => vec![audience],
        OneOrMany::Many(audiences) => audiences,
    })
}

impl Claims {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience.push(audience.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// Principals asserted by these claims, in emission order
    pub fn principals(&self) -> Principals {
        let mut principals = Vec::with_capacity(2 + self.groups.len());
        principals.push(Principal::userid(&self.subject));
        if !self.email.is_empty() {
            principals.push(Principal::email(&self.email));
        }
        principals.extend(self.groups.iter().map(|g| Principal::group(g)));
        principals
    }
}

/// Boundary class of an identity failure, mapped to a status by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
}

/// Identity extraction errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Caller did not declare its origin
    #[error("missing origin")]
    MissingOrigin,

    /// Declared origin is not part of the token audience
    #[error("invalid audience claim for origin {0:?}")]
    AudienceMismatch(String),

    /// Token could not be verified
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl IdentityError {
    pub fn kind(&self) -> IdentityErrorKind {
        match self {
            IdentityError::MissingOrigin => IdentityErrorKind::BadRequest,
            IdentityError::AudienceMismatch(_) => IdentityErrorKind::Forbidden,
            IdentityError::InvalidToken(_) => IdentityErrorKind::Unauthorized,
        }
    }
}

/// Turn verified claims into principals for the declared origin
///
/// An empty origin counts as absent.
pub fn extract_principals(claims: &Claims, origin: Option<&str>) -> Result<Principals, IdentityError> {
    let origin = origin.filter(|o| !o.is_empty()).ok_or(IdentityError::MissingOrigin)?;

    if !claims.audience.iter().any(|aud| aud == origin) {
        debug!(origin, audience = ?claims.audience, "origin not in token audience");
        return Err(IdentityError::AudienceMismatch(origin.to_string()));
    }

    Ok(claims.principals())
}

/// Verifies a bearer token and returns its claims
///
/// Signature and key management live behind this trait.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, IdentityError>;
}

/// Verifies the token, then extracts principals for the declared origin
#[derive(Clone)]
pub struct IdentityExtractor {
    verifier: Arc<dyn TokenVerifier>,
}

impl IdentityExtractor {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Token failures are reported before origin checks
    pub async fn authenticate(&self, token: Option<&str>, origin: Option<&str>) -> Result<Principals, IdentityError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IdentityError::InvalidToken("missing bearer token".to_string()))?;
        let claims = self.verifier.verify(token).await?;
        extract_principals(&claims, origin)
    }
}

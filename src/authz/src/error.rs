//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
///
/// Every variant is raised while loading configuration. Evaluation itself has
/// no error path: anything short of an explicit allow is a deny.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Source could not be read
    #[error("I/O error reading {source_name:?}: {error}")]
    Io {
        source_name: String,
        #[source]
        error: std::io::Error,
    },

    /// Source was readable but empty
    #[error("empty file {0:?}")]
    EmptySource(String),

    /// Source content is not a valid configuration document
    #[error("failed to parse {source_name:?}: {error}")]
    Parse {
        source_name: String,
        #[source]
        error: serde_yaml::Error,
    },

    /// Configuration declares no audience
    #[error("empty audience in {0:?}")]
    EmptyAudience(String),

    /// Two sources declare the same audience
    #[error("duplicated audience {audience:?} (source {source_name:?})")]
    DuplicateAudience {
        audience: String,
        source_name: String,
    },

    /// Two policies of one audience share an ID
    #[error("duplicated policy {id:?} in audience {audience:?}")]
    DuplicatePolicy { audience: String, id: String },

    /// Policy definition cannot be compiled
    #[error("invalid policy {id:?}: {reason}")]
    InvalidPolicy { id: String, reason: String },

    /// Condition descriptor cannot be compiled
    #[error("invalid condition {name:?}: {reason}")]
    InvalidCondition { name: String, reason: String },

    /// Subject, resource or action pattern cannot be compiled
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

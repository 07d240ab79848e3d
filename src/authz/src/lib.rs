//! # Warden Authorization Engine
//!
//! Policy-based authorization for multiple audiences (services).
//!
//! ## Features
//!
//! - **Per-audience policy stores** loaded from YAML, reloaded atomically
//! - **Deny-override evaluation** with default deny
//! - **Ladon-style patterns** (`*`, literals, `<regex>` segments)
//! - **Context conditions** (string, regex, CIDR, list, boolean, subject)
//! - **Tag expansion** of principals
//! - **Identity extraction** from verified token claims
//! - **Audit trail** with one record per decision
//!
//! ## Example
//!
//! ```rust
//! use warden_authz::{AuthzEngine, Configuration, PolicyDefinition, PolicyEffect, Request};
//!
//! let engine = AuthzEngine::default();
//! engine
//!     .registry()
//!     .install(vec![(
//!         "inline".to_string(),
//!         Configuration::new("https://svc1/").with_policy(PolicyDefinition::new(
//!             "1",
//!             PolicyEffect::Allow,
//!             &["group:staff"],
//!             &["doc:<.*>"],
//!             &["read"],
//!         )),
//!     )])
//!     .unwrap();
//!
//! let request = Request::new("doc:42", "read").with_principal("group:staff");
//! assert!(engine.is_allowed("https://svc1/", &request));
//! ```

pub mod audit;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod pattern;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod tags;
pub mod types;

// Re-export commonly used types
pub use audit::{AuditRecord, AuditSink, AuditStats, MemoryAuditSink, TracingAuditSink};
pub use condition::{CidrBlock, ConditionDefinition};
pub use config::{Configuration, ConfigurationLoader, PolicySource, Tags, YamlLoader};
pub use engine::AuthzEngine;
pub use error::{AuthzError, Result};
pub use identity::{
    extract_principals, Claims, IdentityError, IdentityErrorKind, IdentityExtractor, TokenVerifier,
};
pub use pattern::Pattern;
pub use policy::{Policy, PolicyDefinition, PolicyEffect, PolicyStore};
pub use principal::{Namespace, Principal, Principals};
pub use registry::{AudienceRegistry, AudienceStore};
pub use tags::TagExpander;
pub use types::{deserialize_context, Context, ContextValue, Decision, PolicyId, Request};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

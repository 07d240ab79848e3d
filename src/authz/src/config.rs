//! Audience configuration documents and their loader
//!
//! One document per audience:
//!
//! ```yaml
//! audience: https://service.example.com
//! tags:
//!   admins:
//!     - userid:maria
//!     - group:admins
//! policies:
//!   - id: "1"
//!     description: Admins can do anything
//!     subjects: ["tag:admins"]
//!     resources: ["<.*>"]
//!     actions: ["*"]
//!     effect: allow
//! ```

use crate::error::{AuthzError, Result};
use crate::policy::PolicyDefinition;
use crate::principal::Principal;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Tag name to member principals, in declaration order
pub type Tags = IndexMap<String, Vec<Principal>>;

/// Parsed configuration for one audience
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    /// Audience key (tenant/service)
    pub audience: String,

    #[serde(default)]
    pub tags: Tags,

    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
}

impl Configuration {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            ..Self::default()
        }
    }

    pub fn with_tag<I, P>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        self.tags.insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_policy(mut self, policy: PolicyDefinition) -> Self {
        self.policies.push(policy);
        self
    }

    /// Parse a YAML document; `source_name` is used in errors
    pub fn from_yaml(source_name: &str, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(AuthzError::EmptySource(source_name.to_string()));
        }

        serde_yaml::from_str(content).map_err(|error| AuthzError::Parse {
            source_name: source_name.to_string(),
            error,
        })
    }
}

/// Where a configuration document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// YAML file on disk
    File(PathBuf),
    /// In-memory YAML document
    Inline { name: String, content: String },
}

impl PolicySource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        PolicySource::File(path.into())
    }

    pub fn inline(name: impl Into<String>, content: impl Into<String>) -> Self {
        PolicySource::Inline {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Name used in logs and errors
    pub fn name(&self) -> String {
        match self {
            PolicySource::File(path) => path.display().to_string(),
            PolicySource::Inline { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Reads one source into a parsed configuration
#[async_trait]
pub trait ConfigurationLoader: Send + Sync {
    async fn load(&self, source: &PolicySource) -> Result<Configuration>;
}

/// Loads YAML documents from files (via `tokio::fs`) or inline content
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlLoader;

#[async_trait]
impl ConfigurationLoader for YamlLoader {
    async fn load(&self, source: &PolicySource) -> Result<Configuration> {
        match source {
            PolicySource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|error| AuthzError::Io {
                    source_name: source.name(),
                    error,
                })?;
                Configuration::from_yaml(&source.name(), &content)
            }
            PolicySource::Inline { name, content } => Configuration::from_yaml(name, content),
        }
    }
}

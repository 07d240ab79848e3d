//! Core authorization types

use crate::principal::{Principal, Principals};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Unique policy identifier (within one audience)
pub type PolicyId = String;

/// Request context consumed by policy conditions
pub type Context = HashMap<String, ContextValue>;

/// A single context value
///
/// Untagged so that plain JSON/YAML scalars and string arrays map onto it
/// directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
}

/// Deserialize a context, dropping entries `ContextValue` cannot represent
///
/// Nulls, objects and non-string lists are skipped rather than failing the
/// whole request; a `null` context is empty.
pub fn deserialize_context<'de, D>(deserializer: D) -> std::result::Result<Context, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Value(ContextValue),
        Other(#[allow(dead_code)] IgnoredAny),
    }

    let entries = Option::<HashMap<String, Entry>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, entry)| match entry {
            Entry::Value(value) => Some((key, value)),
            Entry::Other(_) => None,
        })
        .collect())
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ContextValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ContextValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::List(value)
    }
}

/// Authorization request
///
/// `principals` holds every identity the caller may assert, before tag
/// expansion. They are tried in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    /// Candidate subjects
    #[serde(default)]
    pub principals: Principals,

    /// Resource being accessed
    pub resource: String,

    /// Action being performed
    pub action: String,

    /// Additional context (remote IP, flags, ...)
    #[serde(default, deserialize_with = "deserialize_context")]
    pub context: Context,
}

impl Request {
    /// Create a request without principals or context
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            principals: Vec::new(),
            resource: resource.into(),
            action: action.into(),
            context: Context::new(),
        }
    }

    /// Add a candidate principal
    pub fn with_principal(mut self, principal: impl Into<Principal>) -> Self {
        self.principals.push(principal.into());
        self
    }

    /// Replace the candidate principals
    pub fn with_principals<I, P>(mut self, principals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Principal>,
    {
        self.principals = principals.into_iter().map(Into::into).collect();
        self
    }

    /// Add a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Outcome of one authorization check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Principal that was granted access (allows only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Principal>,

    /// Policies that granted access, or that forced the denial
    pub matched_policies: Vec<PolicyId>,
}

impl Decision {
    pub fn allow(subject: Principal, matched_policies: Vec<PolicyId>) -> Self {
        Self {
            allowed: true,
            subject: Some(subject),
            matched_policies,
        }
    }

    pub fn deny(matched_policies: Vec<PolicyId>) -> Self {
        Self {
            allowed: false,
            subject: None,
            matched_policies,
        }
    }
}

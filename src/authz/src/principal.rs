//! Principal identifiers
//!
//! A principal is an opaque identity string carrying a namespace prefix,
//! e.g. `userid:42`, `email:alice@example.com`, `group:admins` or
//! `tag:editors`. Principals compare by exact string equality.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of user identifiers derived from the token subject
pub const USERID_PREFIX: &str = "userid:";

/// Prefix of the caller's main email address
pub const EMAIL_PREFIX: &str = "email:";

/// Prefix of group memberships
pub const GROUP_PREFIX: &str = "group:";

/// Prefix of synthetic principals produced by tag expansion
pub const TAG_PREFIX: &str = "tag:";

/// Namespace of a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    UserId,
    Email,
    Group,
    Tag,
    /// Any other prefix, or no prefix at all
    Other,
}

/// A namespaced identity string a caller may assert
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

/// Ordered, non-unique list of principals
pub type Principals = Vec<Principal>;

impl Principal {
    /// Wrap an already-prefixed identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn userid(subject: &str) -> Self {
        Self(format!("{USERID_PREFIX}{subject}"))
    }

    pub fn email(address: &str) -> Self {
        Self(format!("{EMAIL_PREFIX}{address}"))
    }

    pub fn group(name: &str) -> Self {
        Self(format!("{GROUP_PREFIX}{name}"))
    }

    pub fn tag(name: &str) -> Self {
        Self(format!("{TAG_PREFIX}{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Namespace derived from the identifier prefix
    pub fn namespace(&self) -> Namespace {
        if self.0.starts_with(USERID_PREFIX) {
            Namespace::UserId
        } else if self.0.starts_with(EMAIL_PREFIX) {
            Namespace::Email
        } else if self.0.starts_with(GROUP_PREFIX) {
            Namespace::Group
        } else if self.0.starts_with(TAG_PREFIX) {
            Namespace::Tag
        } else {
            Namespace::Other
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<str> for Principal {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Principal {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

//! Policy definition and storage

use crate::condition::{ConditionDefinition, Conditions};
use crate::error::{AuthzError, Result};
use crate::pattern::PatternSet;
use crate::types::{PolicyId, Request};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Policy effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Allow the action
    Allow,
    /// Deny the action
    Deny,
}

/// Policy as written in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDefinition {
    /// Unique policy identifier within the audience
    pub id: PolicyId,

    #[serde(default)]
    pub description: String,

    /// Subject patterns
    #[serde(default)]
    pub subjects: Vec<String>,

    /// Resource patterns
    #[serde(default)]
    pub resources: Vec<String>,

    /// Action patterns
    #[serde(default)]
    pub actions: Vec<String>,

    pub effect: PolicyEffect,

    /// Conditions keyed by context entry
    #[serde(default)]
    pub conditions: IndexMap<String, ConditionDefinition>,
}

impl PolicyDefinition {
    /// Unconditional policy over the given patterns
    pub fn new(
        id: impl Into<PolicyId>,
        effect: PolicyEffect,
        subjects: &[&str],
        resources: &[&str],
        actions: &[&str],
    ) -> Self {
        let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            id: id.into(),
            description: String::new(),
            subjects: owned(subjects),
            resources: owned(resources),
            actions: owned(actions),
            effect,
            conditions: IndexMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_condition(mut self, key: impl Into<String>, condition: ConditionDefinition) -> Self {
        self.conditions.insert(key.into(), condition);
        self
    }
}

/// Compiled, immutable policy
#[derive(Debug, Clone)]
pub struct Policy {
    pub id: PolicyId,
    pub description: String,
    pub effect: PolicyEffect,
    subjects: PatternSet,
    resources: PatternSet,
    actions: PatternSet,
    conditions: Conditions,
}

impl Policy {
    /// Compile a definition, rejecting empty IDs and malformed patterns or conditions
    pub fn compile(definition: &PolicyDefinition) -> Result<Self> {
        if definition.id.is_empty() {
            return Err(AuthzError::InvalidPolicy {
                id: String::new(),
                reason: "empty policy id".to_string(),
            });
        }

        let invalid = |e: AuthzError| AuthzError::InvalidPolicy {
            id: definition.id.clone(),
            reason: e.to_string(),
        };

        Ok(Self {
            id: definition.id.clone(),
            description: definition.description.clone(),
            effect: definition.effect,
            subjects: PatternSet::compile(&definition.subjects).map_err(invalid)?,
            resources: PatternSet::compile(&definition.resources).map_err(invalid)?,
            actions: PatternSet::compile(&definition.actions).map_err(invalid)?,
            conditions: Conditions::compile(&definition.conditions).map_err(invalid)?,
        })
    }

    /// Check if this policy applies to `subject` acting on the request
    pub fn matches(&self, subject: &str, request: &Request) -> bool {
        self.subjects.matches(subject)
            && self.resources.matches(&request.resource)
            && self.actions.matches(&request.action)
            && self.conditions.all_fulfilled(&request.context, subject)
    }

    pub fn allows(&self) -> bool {
        self.effect == PolicyEffect::Allow
    }
}

/// In-memory policy store for one audience
///
/// Keeps declaration order; IDs are unique.
#[derive(Debug, Default)]
pub struct PolicyStore {
    audience: String,
    policies: Vec<Arc<Policy>>,
    index: HashMap<PolicyId, usize>,
}

impl PolicyStore {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            ..Self::default()
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Compile and insert a policy; an existing ID is an error
    pub fn create(&mut self, definition: &PolicyDefinition) -> Result<()> {
        if self.index.contains_key(&definition.id) {
            return Err(AuthzError::DuplicatePolicy {
                audience: self.audience.clone(),
                id: definition.id.clone(),
            });
        }

        let policy = Policy::compile(definition)?;
        self.index.insert(policy.id.clone(), self.policies.len());
        self.policies.push(Arc::new(policy));
        Ok(())
    }

    /// Get a policy by ID
    pub fn get(&self, id: &str) -> Option<&Arc<Policy>> {
        self.index.get(id).map(|&i| &self.policies[i])
    }

    /// All policies in declaration order
    pub fn policies(&self) -> impl Iterator<Item = &Arc<Policy>> {
        self.policies.iter()
    }

    /// Policies applying to `subject` for this request, in declaration order
    pub fn find_matching<'a>(&'a self, subject: &'a str, request: &'a Request) -> impl Iterator<Item = &'a Arc<Policy>> {
        self.policies.iter().filter(move |p| p.matches(subject, request))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_doc_policy() -> PolicyDefinition {
        PolicyDefinition::new("policy-1", PolicyEffect::Allow, &["userid:42"], &["doc:1"], &["read"])
    }

    #[test]
    fn test_policy_matching() {
        let policy = Policy::compile(&read_doc_policy()).unwrap();
        let request = Request::new("doc:1", "read");

        assert!(policy.matches("userid:42", &request));
        assert!(!policy.matches("userid:99", &request));
        assert!(!policy.matches("userid:42", &Request::new("doc:2", "read")));
        assert!(!policy.matches("userid:42", &Request::new("doc:1", "write")));
    }

    #[test]
    fn test_policy_with_condition() {
        let definition = read_doc_policy().with_condition(
            "remoteIP",
            ConditionDefinition::Cidr { cidr: "10.0.0.0/8".into() },
        );
        let policy = Policy::compile(&definition).unwrap();

        let inside = Request::new("doc:1", "read").with_context("remoteIP", "10.2.3.4");
        let outside = Request::new("doc:1", "read").with_context("remoteIP", "192.168.0.1");

        assert!(policy.matches("userid:42", &inside));
        assert!(!policy.matches("userid:42", &outside));
        assert!(!policy.matches("userid:42", &Request::new("doc:1", "read")));
    }

    #[test]
    fn test_empty_id_rejected() {
        let definition = PolicyDefinition::new("", PolicyEffect::Allow, &["*"], &["*"], &["*"]);
        assert!(matches!(Policy::compile(&definition), Err(AuthzError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let definition = PolicyDefinition::new("p", PolicyEffect::Allow, &["<unclosed"], &["*"], &["*"]);
        assert!(matches!(Policy::compile(&definition), Err(AuthzError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_effect_parsing() {
        let definition: PolicyDefinition = serde_yaml::from_str(
            "{id: p, subjects: ['*'], resources: ['*'], actions: ['*'], effect: deny}",
        )
        .unwrap();
        assert_eq!(definition.effect, PolicyEffect::Deny);

        let invalid: std::result::Result<PolicyDefinition, _> =
            serde_yaml::from_str("{id: p, effect: maybe}");
        assert!(invalid.is_err());
    }

    #[test]
    fn test_policy_store() {
        let mut store = PolicyStore::new("svc1");
        store.create(&read_doc_policy()).unwrap();
        store
            .create(&PolicyDefinition::new("policy-2", PolicyEffect::Deny, &["*"], &["doc:1"], &["read"]))
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("policy-1").unwrap().id, "policy-1");
        assert!(store.get("missing").is_none());

        let ids: Vec<_> = store.policies().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["policy-1", "policy-2"]);

        let request = Request::new("doc:1", "read");
        let matching: Vec<_> = store.find_matching("userid:7", &request).map(|p| p.id.clone()).collect();
        assert_eq!(matching, vec!["policy-2".to_string()]);
    }

    #[test]
    fn test_policy_store_duplicate_id() {
        let mut store = PolicyStore::new("svc1");
        store.create(&read_doc_policy()).unwrap();
        assert!(matches!(
            store.create(&read_doc_policy()),
            Err(AuthzError::DuplicatePolicy { ref audience, ref id }) if audience == "svc1" && id == "policy-1"
        ));
        assert_eq!(store.len(), 1);
    }
}

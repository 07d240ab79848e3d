//! Authorization engine
//!
//! ```text
//! principals → TagExpander → expanded principals
//!                                 ↓ (one at a time, in order)
//! Request ──────────────→ PolicyStore (audience) → deny-override → Decision
//!                                                                    ↓
//!                                                               [AuditSink]
//! ```
//!
//! For each candidate principal the full policy set of the audience is
//! evaluated with that principal as the only subject:
//!
//! 1. select policies whose subjects, resources and actions match and whose
//!    conditions all hold
//! 2. any selected `deny` → deny for this principal
//! 3. else any selected `allow` → allow, and the engine stops
//! 4. else deny for this principal
//!
//! If no principal is allowed the request is denied. Unknown audiences are
//! denied without evaluation. Evaluation never fails.

use crate::audit::{AuditRecord, AuditSink, TracingAuditSink};
use crate::config::{ConfigurationLoader, PolicySource};
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::principal::{Principal, Principals};
use crate::registry::{AudienceRegistry, AudienceStore};
use crate::types::{Decision, PolicyId, Request};
use std::sync::Arc;
use tracing::debug;

/// Result of evaluating the policies for a single principal
#[derive(Debug, PartialEq)]
enum Outcome {
    Allowed(Vec<PolicyId>),
    Denied(Vec<PolicyId>),
    NotApplicable,
}

fn evaluate(store: &PolicyStore, subject: &str, request: &Request) -> Outcome {
    let mut allowing = Vec::new();
    let mut denying = Vec::new();

    for policy in store.find_matching(subject, request) {
        if policy.allows() {
            allowing.push(policy.id.clone());
        } else {
            denying.push(policy.id.clone());
        }
    }

    if !denying.is_empty() {
        Outcome::Denied(denying)
    } else if !allowing.is_empty() {
        Outcome::Allowed(allowing)
    } else {
        Outcome::NotApplicable
    }
}

/// Authorization engine over an audience registry
pub struct AuthzEngine {
    registry: Arc<AudienceRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl AuthzEngine {
    /// Create an engine with an empty registry
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self::with_registry(Arc::new(AudienceRegistry::new()), audit)
    }

    /// Create an engine over an existing registry
    pub fn with_registry(registry: Arc<AudienceRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        Self { registry, audit }
    }

    pub fn registry(&self) -> &Arc<AudienceRegistry> {
        &self.registry
    }

    /// (Re)load every source; all-or-nothing
    pub async fn load_policies(&self, loader: &dyn ConfigurationLoader, sources: &[PolicySource]) -> Result<()> {
        self.registry.load(loader, sources).await
    }

    /// Decide whether any of the request principals may perform the action
    pub fn is_allowed(&self, audience: &str, request: &Request) -> bool {
        self.check(audience, request).allowed
    }

    /// Decide, and report which principal and policies settled the decision
    ///
    /// Principals are evaluated as given, without tag expansion. Exactly one
    /// audit record is produced per call.
    pub fn check(&self, audience: &str, request: &Request) -> Decision {
        let store = self.registry.lookup(audience);
        self.decide(audience, store.as_deref(), request)
    }

    /// Expand the request principals with their tags, then decide
    ///
    /// Expansion and evaluation share one registry snapshot, so a concurrent
    /// reload never mixes tags of one configuration with policies of another.
    /// Returns the decision and the expanded principals.
    pub fn check_principals(&self, audience: &str, mut request: Request) -> (Decision, Principals) {
        let store = self.registry.lookup(audience);
        if let Some(store) = &store {
            request.principals = store.expand(&request.principals);
        }

        let decision = self.decide(audience, store.as_deref(), &request);
        (decision, request.principals)
    }

    /// Append the tags of `audience` the principals belong to
    ///
    /// Unknown audiences return the input unchanged.
    pub fn expand_principals(&self, audience: &str, principals: &[Principal]) -> Principals {
        match self.registry.lookup(audience) {
            Some(store) => store.expand(principals),
            None => principals.to_vec(),
        }
    }

    fn decide(&self, audience: &str, store: Option<&AudienceStore>, request: &Request) -> Decision {
        let Some(store) = store else {
            debug!(audience, "unknown audience, denying");
            return self.finish(audience, request, Decision::deny(Vec::new()));
        };

        let mut denying: Vec<PolicyId> = Vec::new();

        for principal in &request.principals {
            match evaluate(store.policies(), principal.as_str(), request) {
                Outcome::Allowed(policies) => {
                    debug!(audience, subject = %principal, ?policies, "allowed");
                    return self.finish(audience, request, Decision::allow(principal.clone(), policies));
                }
                Outcome::Denied(policies) => {
                    debug!(audience, subject = %principal, ?policies, "forcefully denied");
                    for id in policies {
                        if !denying.contains(&id) {
                            denying.push(id);
                        }
                    }
                }
                Outcome::NotApplicable => {
                    debug!(audience, subject = %principal, "no matching policy");
                }
            }
        }

        self.finish(audience, request, Decision::deny(denying))
    }

    fn finish(&self, audience: &str, request: &Request, decision: Decision) -> Decision {
        self.audit.record(AuditRecord::new(
            audience,
            request,
            decision.allowed,
            decision.subject.clone(),
            decision.matched_policies.clone(),
        ));
        decision
    }
}

impl Default for AuthzEngine {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

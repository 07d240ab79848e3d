//! Per-audience policy stores and atomic reload
//!
//! The live audience map is an immutable snapshot behind a single
//! replaceable `Arc`. Reload builds a complete new map first and publishes it
//! with one pointer swap, so readers see either the old set of audiences or
//! the new one, never a mix. A failed reload leaves the old snapshot serving.

use crate::config::{Configuration, ConfigurationLoader, PolicySource};
use crate::error::{AuthzError, Result};
use crate::policy::PolicyStore;
use crate::principal::{Principal, Principals};
use crate::tags::TagExpander;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compiled policies and tags of one audience
#[derive(Debug)]
pub struct AudienceStore {
    policies: PolicyStore,
    tags: TagExpander,
}

impl AudienceStore {
    /// Validate and compile one configuration
    pub fn compile(source_name: &str, configuration: &Configuration) -> Result<Self> {
        if configuration.audience.is_empty() {
            return Err(AuthzError::EmptyAudience(source_name.to_string()));
        }

        if configuration.policies.is_empty() {
            warn!("no policies found in {:?}", source_name);
        }

        let mut policies = PolicyStore::new(&configuration.audience);
        for definition in &configuration.policies {
            info!("Load policy {}: {}", definition.id, definition.description);
            policies.create(definition)?;
        }

        Ok(Self {
            policies,
            tags: TagExpander::new(configuration.tags.clone()),
        })
    }

    pub fn audience(&self) -> &str {
        self.policies.audience()
    }

    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    pub fn tags(&self) -> &TagExpander {
        &self.tags
    }

    pub fn expand(&self, principals: &[Principal]) -> Principals {
        self.tags.expand(principals)
    }
}

type AudienceMap = HashMap<String, Arc<AudienceStore>>;

/// Live audience → store map
#[derive(Debug, Default)]
pub struct AudienceRegistry {
    live: RwLock<Arc<AudienceMap>>,
}

impl AudienceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot; later reloads do not affect it
    fn snapshot(&self) -> Arc<AudienceMap> {
        self.live.read().clone()
    }

    /// Store of `audience` in the current snapshot
    pub fn lookup(&self, audience: &str) -> Option<Arc<AudienceStore>> {
        self.live.read().get(audience).cloned()
    }

    /// Load every source and publish them together
    ///
    /// Any failure (unreadable or empty source, parse error, empty or
    /// duplicated audience, duplicated policy ID, bad pattern or condition)
    /// aborts the whole reload and keeps the previous registry.
    pub async fn load(&self, loader: &dyn ConfigurationLoader, sources: &[PolicySource]) -> Result<()> {
        let mut configurations = Vec::with_capacity(sources.len());
        for source in sources {
            info!("Load configuration {}", source);
            configurations.push((source.name(), loader.load(source).await?));
        }
        self.install(configurations)
    }

    /// Compile already-parsed configurations and publish them together
    ///
    /// Same all-or-nothing semantics as [`AudienceRegistry::load`]. Each
    /// configuration is paired with the name of its source, used in errors.
    pub fn install<I>(&self, configurations: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Configuration)>,
    {
        let mut next = AudienceMap::new();

        for (source_name, configuration) in configurations {
            let store = AudienceStore::compile(&source_name, &configuration)?;
            if next.contains_key(&configuration.audience) {
                return Err(AuthzError::DuplicateAudience {
                    audience: configuration.audience,
                    source_name,
                });
            }
            debug!(audience = %configuration.audience, policies = store.policies().len(), "compiled audience");
            next.insert(configuration.audience, Arc::new(store));
        }

        let count = next.len();
        // The old map is dropped after the write guard is released
        let previous = std::mem::replace(&mut *self.live.write(), Arc::new(next));
        drop(previous);
        info!(audiences = count, "Policies reloaded");
        Ok(())
    }

    /// Audiences of the current snapshot, sorted
    pub fn audiences(&self) -> Vec<String> {
        let mut audiences: Vec<String> = self.snapshot().keys().cloned().collect();
        audiences.sort();
        audiences
    }

    pub fn len(&self) -> usize {
        self.live.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.read().is_empty()
    }
}

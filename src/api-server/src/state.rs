use std::sync::Arc;
use std::time::Instant;
use warden_authz::{
    AuthzEngine, ConfigurationLoader, IdentityExtractor, PolicySource, TokenVerifier, YamlLoader,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Authorization engine
    pub engine: Arc<AuthzEngine>,

    /// Reads policy sources on startup and reload
    pub loader: Arc<dyn ConfigurationLoader>,

    /// Policy sources, re-read on every reload
    pub sources: Vec<PolicySource>,

    /// Derives principals from bearer tokens when configured
    pub identity: Option<IdentityExtractor>,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    /// Application version
    pub version: String,

    /// Take the client address from `x-forwarded-for` instead of the peer
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(engine: Arc<AuthzEngine>, sources: Vec<PolicySource>) -> Self {
        Self {
            engine,
            loader: Arc::new(YamlLoader),
            sources,
            identity: None,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trust_forwarded_for: false,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ConfigurationLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.identity = Some(IdentityExtractor::new(verifier));
        self
    }

    /// Only enable behind a proxy that overwrites `x-forwarded-for`
    pub fn with_trusted_forwarding(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Re-read every source; the previous policies keep serving on failure
    pub async fn reload(&self) -> warden_authz::Result<()> {
        self.engine.load_policies(self.loader.as_ref(), &self.sources).await
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(AuthzEngine::default()), Vec::new())
    }
}

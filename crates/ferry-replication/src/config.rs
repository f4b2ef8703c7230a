//! Configuration for the replication control plane.

use ferry_core::model::{Credential, Registry, RegistryType, LOCAL_REGISTRY_ID};

/// Default cap on concurrently running replication flows.
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 10;

/// Configuration of the replication controller.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// The host registry that local policy endpoints resolve to.
    pub local_registry: LocalRegistryConfig,

    /// Maximum number of flows running at once.
    pub max_concurrent_executions: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            local_registry: LocalRegistryConfig::default(),
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        }
    }
}

impl ReplicationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local registry.
    #[must_use]
    pub fn with_local_registry(mut self, local_registry: LocalRegistryConfig) -> Self {
        self.local_registry = local_registry;
        self
    }

    /// Sets the flow concurrency cap.
    #[must_use]
    pub const fn with_max_concurrent_executions(mut self, max: usize) -> Self {
        self.max_concurrent_executions = max;
        self
    }
}

/// Connection details of the host registry.
#[derive(Debug, Clone)]
pub struct LocalRegistryConfig {
    /// Base URL.
    pub url: String,

    /// Credential used by adapters talking to the host registry.
    pub credential: Option<Credential>,

    /// Skip TLS verification.
    pub insecure: bool,
}

impl Default for LocalRegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            credential: None,
            insecure: false,
        }
    }
}

impl LocalRegistryConfig {
    /// Creates a configuration for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Skips TLS verification.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Builds the registry record local endpoints resolve to.
    #[must_use]
    pub fn to_registry(&self) -> Registry {
        let mut registry = Registry::new(
            LOCAL_REGISTRY_ID,
            "Local",
            RegistryType::HARBOR,
            self.url.clone(),
        );
        registry.credential.clone_from(&self.credential);
        registry.insecure = self.insecure;
        registry
    }
}

//! The adapter factory table.
//!
//! Factories are registered once while the process starts, then frozen into
//! an immutable [`FactoryRegistry`] that is handed to whoever builds
//! adapters. A registry record is the only input a factory receives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ferry_core::model::{Registry, RegistryType};

use crate::adapter::Adapter;
use crate::error::{AdapterError, Result};

/// Builds adapters for one registry type.
pub trait AdapterFactory: Send + Sync {
    /// Creates an adapter for the registry record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be turned into a client.
    fn create(&self, registry: &Registry) -> Result<Box<dyn Adapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&Registry) -> Result<Box<dyn Adapter>> + Send + Sync,
{
    fn create(&self, registry: &Registry) -> Result<Box<dyn Adapter>> {
        self(registry)
    }
}

/// Collects factories before the table is frozen.
#[derive(Default)]
pub struct FactoryRegistryBuilder {
    factories: HashMap<RegistryType, Arc<dyn AdapterFactory>>,
}

impl FactoryRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for a registry type.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::DuplicateFactory`] if the type already has a
    /// factory.
    pub fn register(
        &mut self,
        registry_type: impl Into<RegistryType>,
        factory: impl AdapterFactory + 'static,
    ) -> Result<&mut Self> {
        let registry_type = registry_type.into();
        if self.factories.contains_key(&registry_type) {
            return Err(AdapterError::DuplicateFactory {
                registry_type: registry_type.to_string(),
            });
        }
        self.factories.insert(registry_type, Arc::new(factory));
        Ok(self)
    }

    /// Freezes the table.
    #[must_use]
    pub fn build(self) -> FactoryRegistry {
        FactoryRegistry {
            factories: Arc::new(self.factories),
        }
    }
}

/// Immutable map from registry type to adapter factory.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: Arc<HashMap<RegistryType, Arc<dyn AdapterFactory>>>,
}

impl FactoryRegistry {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> FactoryRegistryBuilder {
        FactoryRegistryBuilder::new()
    }

    /// Returns true if a factory is registered for the type.
    #[must_use]
    pub fn contains(&self, registry_type: &RegistryType) -> bool {
        self.factories.contains_key(registry_type)
    }

    /// Returns the registered types, sorted.
    #[must_use]
    pub fn registry_types(&self) -> Vec<RegistryType> {
        let mut types: Vec<_> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Builds an adapter for the registry record.
    ///
    /// # Errors
    ///
    /// Returns [`ferry_core::Error::Unsupported`] when no factory handles the
    /// record's type, or the factory's error converted into the core
    /// taxonomy.
    pub fn create(&self, registry: &Registry) -> ferry_core::Result<Box<dyn Adapter>> {
        let factory = self.factories.get(&registry.registry_type).ok_or_else(|| {
            AdapterError::FactoryNotFound {
                registry_type: registry.registry_type.to_string(),
            }
        })?;
        Ok(factory.create(registry)?)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("registry_types", &self.registry_types())
            .finish()
    }
}

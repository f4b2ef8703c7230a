//! The registry adapter contract.
//!
//! Every endpoint exposes the base [`Adapter`] capability set. Artifact and
//! chart support are optional sub-capabilities: an adapter advertises the
//! resource types it handles in [`RegistryInfo`] and hands out the matching
//! trait object from [`Adapter::as_artifact_registry`] or
//! [`Adapter::as_chart_registry`]. Callers check the advertisement first and
//! turn a missing capability into [`Error::Unsupported`].

use async_trait::async_trait;
use futures::stream::BoxStream;

use ferry_core::filter::Filter;
use ferry_core::model::{Resource, ResourceType};
use ferry_core::{Error, Result};

use crate::info::{Descriptor, HealthStatus, RegistryInfo};

/// A stream of chart archive bytes.
pub type ChartStream = BoxStream<'static, Result<Vec<u8>>>;

/// Base capability set of a registry endpoint.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Describes the registry: supported resource types, filters, triggers
    /// and path constraint.
    async fn describe(&self) -> Result<RegistryInfo>;

    /// Prepares the registry to receive the given resources, e.g. by creating
    /// namespaces.
    async fn prepare_for_push(&self, resources: &[Resource]) -> Result<()>;

    /// Probes the registry.
    async fn health_check(&self) -> Result<HealthStatus>;

    /// Returns the artifact capability, if implemented.
    fn as_artifact_registry(&self) -> Option<&dyn ArtifactRegistry> {
        None
    }

    /// Returns the chart capability, if implemented.
    fn as_chart_registry(&self) -> Option<&dyn ChartRegistry> {
        None
    }
}

/// Image and OCI artifact operations.
#[async_trait]
pub trait ArtifactRegistry: Send + Sync {
    /// Lists artifacts selected by the filters.
    async fn fetch_artifacts(&self, filters: &[Filter]) -> Result<Vec<Resource>>;

    /// Looks up a manifest by tag or digest.
    async fn manifest_exists(
        &self,
        repository: &str,
        reference: &str,
    ) -> Result<(bool, Option<Descriptor>)>;

    /// Deletes a manifest by tag or digest. Deleting something that does not
    /// exist succeeds.
    async fn delete_manifest(&self, repository: &str, reference: &str) -> Result<()>;
}

/// Helm chart operations.
#[async_trait]
pub trait ChartRegistry: Send + Sync {
    /// Lists charts selected by the filters.
    async fn fetch_charts(&self, filters: &[Filter]) -> Result<Vec<Resource>>;

    /// Returns true if the chart version exists.
    async fn chart_exists(&self, name: &str, version: &str) -> Result<bool>;

    /// Streams a chart archive.
    async fn download_chart(&self, name: &str, version: &str, content_url: &str)
        -> Result<ChartStream>;

    /// Uploads a chart archive.
    async fn upload_chart(&self, name: &str, version: &str, chart: ChartStream) -> Result<()>;

    /// Deletes a chart version.
    async fn delete_chart(&self, name: &str, version: &str) -> Result<()>;
}

/// Returns the artifact capability or an [`Error::Unsupported`].
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if the adapter has no artifact capability.
pub fn artifact_registry(adapter: &dyn Adapter) -> Result<&dyn ArtifactRegistry> {
    adapter
        .as_artifact_registry()
        .ok_or_else(|| Error::unsupported("the registry does not support artifacts"))
}

/// Returns the chart capability or an [`Error::Unsupported`].
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if the adapter has no chart capability.
pub fn chart_registry(adapter: &dyn Adapter) -> Result<&dyn ChartRegistry> {
    adapter
        .as_chart_registry()
        .ok_or_else(|| Error::unsupported("the registry does not support charts"))
}

/// Fetches resources of the given type through the matching capability.
///
/// `image` and `artifact` both go through
/// [`ArtifactRegistry::fetch_artifacts`].
///
/// # Errors
///
/// Returns [`Error::Unsupported`] if the adapter lacks the capability, or the
/// adapter's own error.
pub async fn fetch_resources(
    adapter: &dyn Adapter,
    resource_type: ResourceType,
    filters: &[Filter],
) -> Result<Vec<Resource>> {
    match resource_type {
        ResourceType::Image | ResourceType::Artifact => {
            artifact_registry(adapter)?.fetch_artifacts(filters).await
        }
        ResourceType::Chart => chart_registry(adapter)?.fetch_charts(filters).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::model::RegistryType;
    use ferry_core::ErrorKind;

    struct BareAdapter;

    #[async_trait]
    impl Adapter for BareAdapter {
        async fn describe(&self) -> Result<RegistryInfo> {
            Ok(RegistryInfo::new(RegistryType::from("bare"), Vec::new()))
        }

        async fn prepare_for_push(&self, _resources: &[Resource]) -> Result<()> {
            Ok(())
        }

        async fn health_check(&self) -> Result<HealthStatus> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[tokio::test]
    async fn test_missing_capability_is_unsupported() {
        let adapter = BareAdapter;
        assert!(adapter.as_artifact_registry().is_none());

        let err = fetch_resources(&adapter, ResourceType::Image, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let err = fetch_resources(&adapter, ResourceType::Chart, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}

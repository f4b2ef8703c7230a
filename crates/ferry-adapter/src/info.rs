//! What an adapter advertises about its registry.

use serde::{Deserialize, Serialize};

use ferry_core::filter::FilterType;
use ferry_core::model::{PathComponentType, RegistryType, ResourceType};
use ferry_core::policy::TriggerType;

/// How a filter is entered in a policy editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStyle {
    /// Free text.
    Input,
    /// One of `values`.
    Radio,
    /// Any subset of `values`.
    List,
}

/// A filter kind an adapter understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSupport {
    /// Filter kind.
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Editor style.
    pub style: FilterStyle,
    /// Allowed values for `radio`/`list` styles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl FilterSupport {
    /// A free-text filter.
    #[must_use]
    pub const fn input(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            style: FilterStyle::Input,
            values: Vec::new(),
        }
    }
}

/// Description returned by [`Adapter::describe`](crate::Adapter::describe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    /// Adapter type tag.
    #[serde(rename = "type")]
    pub registry_type: RegistryType,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Resource types the registry can serve or receive.
    pub supported_resource_types: Vec<ResourceType>,
    /// Filters the adapter understands.
    #[serde(default)]
    pub supported_resource_filters: Vec<FilterSupport>,
    /// Triggers usable with the registry as an endpoint.
    #[serde(default)]
    pub supported_triggers: Vec<TriggerType>,
    /// Constraint on destination repository paths.
    #[serde(default)]
    pub supported_repository_path_component_type: PathComponentType,
}

impl RegistryInfo {
    /// Creates a description for the given type and resource types.
    #[must_use]
    pub fn new(registry_type: RegistryType, supported_resource_types: Vec<ResourceType>) -> Self {
        Self {
            registry_type,
            description: String::new(),
            supported_resource_types,
            supported_resource_filters: Vec::new(),
            supported_triggers: vec![TriggerType::Manual, TriggerType::Scheduled],
            supported_repository_path_component_type: PathComponentType::Unconstrained,
        }
    }

    /// Returns true if the registry handles the resource type.
    ///
    /// `image` and `artifact` are served by the same capability, so either
    /// one satisfies the other.
    #[must_use]
    pub fn supports_resource_type(&self, resource_type: ResourceType) -> bool {
        self.supported_resource_types.iter().any(|t| {
            *t == resource_type || (t.is_artifact_like() && resource_type.is_artifact_like())
        })
    }

    /// Returns true if the filter kind is understood.
    #[must_use]
    pub fn supports_filter(&self, filter_type: &FilterType) -> bool {
        self.supported_resource_filters
            .iter()
            .any(|f| &f.filter_type == filter_type)
    }
}

/// Result of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The registry answered.
    Healthy,
    /// The registry did not answer or answered with an error.
    Unhealthy,
}

impl HealthStatus {
    /// Returns true for [`HealthStatus::Healthy`].
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Content descriptor returned by manifest lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Media type of the manifest.
    pub media_type: String,
    /// Manifest digest.
    pub digest: String,
    /// Manifest size in bytes.
    pub size: u64,
}

//! In-memory representation of an artifact set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::model::registry::Registry;

/// Kind of replicated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Any OCI artifact.
    Artifact,
    /// A container image.
    Image,
    /// A Helm chart.
    Chart,
}

impl ResourceType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artifact => "artifact",
            Self::Image => "image",
            Self::Chart => "chart",
        }
    }

    /// Returns true for the types served by the artifact capability.
    #[must_use]
    pub const fn is_artifact_like(self) -> bool {
        matches!(self, Self::Artifact | Self::Image)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "artifact" => Ok(Self::Artifact),
            "image" => Ok(Self::Image),
            "chart" => Ok(Self::Chart),
            other => Err(Error::bad_request(format!("invalid resource type: {other}"))),
        }
    }
}

/// A repository and its (project-level) metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Full repository path, e.g. `library/hello-world`.
    pub name: String,
    /// Free-form metadata (e.g. `public`).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Repository {
    /// Creates a repository with empty metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: Map::new(),
        }
    }

    /// Returns true when the metadata marks the repository as public.
    ///
    /// Missing metadata counts as private.
    #[must_use]
    pub fn is_public(&self) -> bool {
        match self.metadata.get("public") {
            Some(Value::Bool(public)) => *public,
            Some(Value::String(public)) => public.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// One addressable artifact within a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    /// Artifact media kind (e.g. `image`).
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// Content digest.
    pub digest: String,
    /// Tags pointing at the artifact.
    pub tags: Vec<String>,
    /// Labels attached to the artifact.
    pub labels: Vec<String>,
    /// Tags of the parent artifact for accessories.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_tags: Vec<String>,
    /// Whether the artifact is an accessory (signature, SBOM, ...).
    pub is_accessory: bool,
}

impl Artifact {
    /// Creates an artifact identified by digest.
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            ..Self::default()
        }
    }

    /// Sets the artifact type.
    #[must_use]
    pub fn with_type(mut self, artifact_type: impl Into<String>) -> Self {
        self.artifact_type = artifact_type.into();
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Repository plus the artifacts selected within it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceMetadata {
    /// The repository.
    pub repository: Option<Repository>,
    /// Selected artifacts; authoritative over `vtags`.
    pub artifacts: Vec<Artifact>,
    /// Legacy version tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vtags: Vec<String>,
}

/// A replicable resource: a repository with artifacts, bound to a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource kind.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Repository and artifacts.
    #[serde(default)]
    pub metadata: Option<ResourceMetadata>,
    /// The registry the resource lives in.
    #[serde(default)]
    pub registry: Option<Registry>,
    /// Adapter-specific extras.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extended_info: Map<String, Value>,
    /// Whether the resource was deleted at the source.
    #[serde(default)]
    pub deleted: bool,
    /// Whether only a tag (not the artifact) was deleted.
    #[serde(default)]
    pub is_delete_tag: bool,
    /// Whether existing content at the destination may be overwritten.
    #[serde(default, rename = "override")]
    pub override_existing: bool,
    /// Set by adapters for resources the destination cannot receive.
    #[serde(default)]
    pub skip: bool,
}

impl Resource {
    /// Creates a resource for the named repository without artifacts.
    pub fn new(resource_type: ResourceType, repository: impl Into<String>) -> Self {
        Self {
            resource_type,
            metadata: Some(ResourceMetadata {
                repository: Some(Repository::new(repository)),
                ..ResourceMetadata::default()
            }),
            registry: None,
            extended_info: Map::new(),
            deleted: false,
            is_delete_tag: false,
            override_existing: false,
            skip: false,
        }
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.metadata
            .get_or_insert_with(ResourceMetadata::default)
            .artifacts
            .push(artifact);
        self
    }

    /// Marks the resource as deleted at the source.
    #[must_use]
    pub const fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Returns the repository, if any.
    #[must_use]
    pub fn repository(&self) -> Option<&Repository> {
        self.metadata.as_ref()?.repository.as_ref()
    }

    /// Returns the repository name, if any.
    #[must_use]
    pub fn repository_name(&self) -> Option<&str> {
        self.repository().map(|r| r.name.as_str())
    }

    /// Returns the artifacts, empty when there is no metadata.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        self.metadata.as_ref().map_or(&[], |m| m.artifacts.as_slice())
    }

    /// Counts the items the resource stands for.
    ///
    /// Each artifact contributes its tag count, or one when it is untagged but
    /// has a digest. Without artifacts the legacy `vtags` are counted.
    #[must_use]
    pub fn item_count(&self) -> usize {
        let Some(meta) = &self.metadata else {
            return 0;
        };
        if meta.artifacts.is_empty() {
            return meta.vtags.len();
        }
        meta.artifacts
            .iter()
            .map(|a| {
                if !a.tags.is_empty() {
                    a.tags.len()
                } else {
                    usize::from(!a.digest.is_empty())
                }
            })
            .sum()
    }

    /// Human summary used in task metadata: `"<repo> [<N> item(s) in total]"`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} [{} item(s) in total]",
            self.repository_name().unwrap_or_default(),
            self.item_count()
        )
    }

    /// Comma-joined references (tags, falling back to digests, then vtags).
    #[must_use]
    pub fn references(&self) -> String {
        let Some(meta) = &self.metadata else {
            return String::new();
        };
        if meta.artifacts.is_empty() {
            return meta.vtags.join(",");
        }
        let mut refs = Vec::new();
        for artifact in &meta.artifacts {
            if artifact.tags.is_empty() {
                if !artifact.digest.is_empty() {
                    refs.push(artifact.digest.as_str());
                }
            } else {
                refs.extend(artifact.tags.iter().map(String::as_str));
            }
        }
        refs.join(",")
    }
}

//! Resource and registry model.

pub mod registry;
pub mod resource;

pub use registry::{
    is_local_endpoint, Credential, CredentialType, PathComponentType, Registry, RegistryType,
    LOCAL_REGISTRY_ID,
};
pub use resource::{Artifact, Repository, Resource, ResourceMetadata, ResourceType};

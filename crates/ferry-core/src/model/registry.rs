//! Registry records shared between policies, resources and adapter factories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The id reserved for the local (host) registry.
pub const LOCAL_REGISTRY_ID: i64 = 0;

/// Type tag of a registry; the key of the adapter factory table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryType(String);

impl RegistryType {
    /// The host registry.
    pub const HARBOR: &'static str = "harbor";
    /// A plain Docker Registry HTTP API v2 endpoint.
    pub const DOCKER_REGISTRY: &'static str = "docker-registry";
    /// Docker Hub.
    pub const DOCKER_HUB: &'static str = "docker-hub";

    /// Creates a registry type from its tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the type tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistryType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Kind of credential attached to a registry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    /// Username and password.
    #[default]
    Basic,
    /// OAuth access key / secret pair.
    #[serde(rename = "oauth")]
    OAuth,
    /// A pre-shared secret.
    Secret,
}

/// Credential used by adapters to talk to a registry.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credential {
    /// Credential kind.
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    /// Access key (username for basic auth).
    pub access_key: String,
    /// Access secret (password for basic auth).
    pub access_secret: String,
}

impl Credential {
    /// Creates a basic-auth credential.
    pub fn basic(access_key: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            credential_type: CredentialType::Basic,
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("credential_type", &self.credential_type)
            .field("access_key", &self.access_key)
            .field("access_secret", &"***")
            .finish()
    }
}

/// A registry endpoint record.
///
/// Policies reference registries by id; the replication controller resolves
/// the full record before adapters are built. The record is the only input
/// an adapter factory receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    /// Registry id; [`LOCAL_REGISTRY_ID`] for the host registry.
    pub id: i64,
    /// Human name.
    pub name: String,
    /// Adapter type tag.
    #[serde(rename = "type")]
    pub registry_type: RegistryType,
    /// Base URL.
    pub url: String,
    /// Credential, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    /// Skip TLS verification.
    pub insecure: bool,
    /// Extra PEM CA certificate to trust.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,
    /// Token service URL for registries with a separate auth endpoint.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_service_url: String,
}

impl Registry {
    /// Creates a registry record.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        registry_type: impl Into<RegistryType>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            registry_type: registry_type.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a bare reference carrying only an id, as stored in policies.
    #[must_use]
    pub fn reference(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Sets the credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Marks the registry as insecure.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Returns true if this record designates the local registry.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.id == LOCAL_REGISTRY_ID
    }
}

/// Returns true if an optional registry endpoint designates the local registry.
///
/// An absent record counts as local.
#[must_use]
pub fn is_local_endpoint(registry: Option<&Registry>) -> bool {
    registry.map_or(true, Registry::is_local)
}

/// Destination-side constraint on the number of `/`-separated segments in a
/// repository name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathComponentType {
    /// Exactly two components (`namespace/name`).
    OnlyTwo,
    /// Two or more components.
    AtLeastTwo,
    /// No constraint.
    #[default]
    Unconstrained,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reference_parses_from_id_only() {
        let registry: Registry = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(registry, Registry::reference(3));
        assert!(!registry.is_local());
    }

    #[test]
    fn test_local_endpoint() {
        assert!(is_local_endpoint(None));
        assert!(is_local_endpoint(Some(&Registry::reference(0))));
        assert!(!is_local_endpoint(Some(&Registry::reference(7))));
    }

    #[test]
    fn test_registry_json_shape() {
        let registry = Registry::new(1, "hub", RegistryType::DOCKER_HUB, "https://hub.docker.com")
            .with_credential(Credential::basic("user", "secret"));
        let json = serde_json::to_value(&registry).unwrap();

        assert_eq!(json["type"], "docker-hub");
        assert_eq!(json["credential"]["type"], "basic");
        assert_eq!(json["credential"]["access_key"], "user");
        assert!(json.get("ca_certificate").is_none());
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = Credential::basic("user", "hunter2");
        let debug = format!("{credential:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_path_component_type_serde() {
        let json = serde_json::to_string(&PathComponentType::AtLeastTwo).unwrap();
        assert_eq!(json, r#""at_least_two""#);
        assert_eq!(PathComponentType::default(), PathComponentType::Unconstrained);
    }
}

//! Adapter for plain Docker Registry HTTP API v2 endpoints.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LINK};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use ferry_core::filter::{apply_filters, Filter, FilterType};
use ferry_core::model::{Artifact, CredentialType, Registry, RegistryType, Resource, ResourceType};

use crate::adapter::{Adapter, ArtifactRegistry};
use crate::config::NativeAdapterConfig;
use crate::error::{AdapterError, Result};
use crate::factory::AdapterFactory;
use crate::info::{Descriptor, FilterSupport, HealthStatus, RegistryInfo};
use crate::runner::run_bounded;

/// Manifest media types accepted on lookups.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
    application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.list.v2+json, \
    application/vnd.docker.distribution.manifest.v2+json";

const DIGEST_HEADER: &str = "Docker-Content-Digest";

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Adapter speaking the Docker Registry HTTP API v2.
#[derive(Debug)]
pub struct NativeAdapter {
    registry: Registry,
    config: NativeAdapterConfig,
    base_url: Url,
    http: reqwest::Client,
}

impl NativeAdapter {
    /// Creates an adapter for the registry record.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed, the CA certificate is not
    /// valid PEM, or the HTTP client cannot be built.
    pub fn new(registry: Registry, config: NativeAdapterConfig) -> Result<Self> {
        let base = format!("{}/", registry.url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| AdapterError::InvalidUrl {
            url: registry.url.clone(),
            message: e.to_string(),
        })?;
        let http = Self::build_http_client(&registry, &config)?;

        Ok(Self {
            registry,
            config,
            base_url,
            http,
        })
    }

    /// Returns the registry record.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lists every repository in the catalog, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn list_repositories(&self) -> Result<Vec<String>> {
        let first = self.endpoint(&format!("v2/_catalog?n={}", self.config.page_size))?;
        let pages: Vec<Catalog> = self.get_pages(first).await?.unwrap_or_default();
        Ok(pages.into_iter().flat_map(|page| page.repositories).collect())
    }

    /// Lists the tags of a repository; an unknown repository has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag list cannot be read.
    pub async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let first = self.endpoint(&format!("v2/{repository}/tags/list"))?;
        let pages: Vec<TagList> = self.get_pages(first).await?.unwrap_or_default();
        Ok(pages
            .into_iter()
            .flat_map(|page| page.tags.unwrap_or_default())
            .collect())
    }

    fn build_http_client(
        registry: &Registry,
        config: &NativeAdapterConfig,
    ) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent);

        if registry.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref pem) = registry.ca_certificate {
            let cert = reqwest::Certificate::from_pem(pem.as_bytes()).map_err(|e| {
                AdapterError::InvalidConfig {
                    message: format!("invalid CA certificate: {e}"),
                }
            })?;
            builder = builder.add_root_certificate(cert);
        }

        builder.build().map_err(|e| AdapterError::InvalidConfig {
            message: format!("failed to build HTTP client: {e}"),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AdapterError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                message: e.to_string(),
            })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.registry.credential {
            Some(credential) if credential.credential_type == CredentialType::Secret => {
                builder.bearer_auth(&credential.access_secret)
            }
            Some(credential) => {
                builder.basic_auth(&credential.access_key, Some(&credential.access_secret))
            }
            None => builder,
        }
    }

    /// GETs `first` and every page linked from it with `rel="next"`.
    ///
    /// Returns `None` when the first page is a 404. A `next` link pointing
    /// back at a page already fetched is an [`AdapterError::InvalidResponse`].
    async fn get_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Option<Vec<T>>> {
        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                warn!(%url, "pagination link cycles back to a fetched page");
                return Err(AdapterError::InvalidResponse {
                    message: format!("pagination cycles back to {url}"),
                });
            }
            let response = self.request(Method::GET, url).send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND && pages.is_empty() {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(AdapterError::HttpError {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            if let Some(link) = next_link(response.headers()) {
                next = Some(self.endpoint(&link)?);
            }
            pages.push(response.json().await?);
        }

        Ok(Some(pages))
    }

    async fn head_manifest(&self, repository: &str, reference: &str) -> Result<Option<Descriptor>> {
        let url = self.endpoint(&format!("v2/{repository}/manifests/{reference}"))?;
        let response = self
            .request(Method::HEAD, url)
            .header(ACCEPT, MANIFEST_ACCEPT)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(descriptor_from(response.headers()))),
            status => Err(AdapterError::HttpError {
                status: status.as_u16(),
                message: format!("failed to look up manifest {repository}:{reference}"),
            }),
        }
    }

    async fn delete_by_digest(&self, repository: &str, digest: &str) -> Result<()> {
        let url = self.endpoint(&format!("v2/{repository}/manifests/{digest}"))?;
        let response = self.request(Method::DELETE, url).send().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!(%repository, %digest, "deleted manifest");
            return Ok(());
        }
        Err(AdapterError::HttpError {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl reqwest::header::AsHeaderName) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn descriptor_from(headers: &HeaderMap) -> Descriptor {
    Descriptor {
        media_type: header_str(headers, CONTENT_TYPE).to_string(),
        digest: header_str(headers, DIGEST_HEADER).to_string(),
        size: header_str(headers, CONTENT_LENGTH).parse().unwrap_or_default(),
    }
}

/// Extracts the target of a `Link: <...>; rel="next"` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params.contains(r#"rel="next""#).then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

#[async_trait]
impl Adapter for NativeAdapter {
    async fn describe(&self) -> ferry_core::Result<RegistryInfo> {
        let mut info = RegistryInfo::new(
            RegistryType::from(RegistryType::DOCKER_REGISTRY),
            vec![ResourceType::Image],
        );
        info.description = "Docker Registry HTTP API v2".to_string();
        info.supported_resource_filters = vec![
            FilterSupport::input(FilterType::Name),
            FilterSupport::input(FilterType::Tag),
        ];
        Ok(info)
    }

    async fn prepare_for_push(&self, resources: &[Resource]) -> ferry_core::Result<()> {
        // Repositories are created implicitly by the first push.
        debug!(count = resources.len(), registry = %self.registry.url, "nothing to prepare");
        Ok(())
    }

    async fn health_check(&self) -> ferry_core::Result<HealthStatus> {
        let url = self.endpoint("v2/")?;
        match self.request(Method::GET, url).send().await {
            Ok(response)
                if response.status().is_success()
                    || response.status() == StatusCode::UNAUTHORIZED =>
            {
                Ok(HealthStatus::Healthy)
            }
            Ok(response) => {
                warn!(
                    registry = %self.registry.url,
                    status = %response.status(),
                    "registry unhealthy"
                );
                Ok(HealthStatus::Unhealthy)
            }
            Err(e) => {
                warn!(registry = %self.registry.url, error = %e, "registry unreachable");
                Ok(HealthStatus::Unhealthy)
            }
        }
    }

    fn as_artifact_registry(&self) -> Option<&dyn ArtifactRegistry> {
        Some(self)
    }
}

#[async_trait]
impl ArtifactRegistry for NativeAdapter {
    async fn fetch_artifacts(&self, filters: &[Filter]) -> ferry_core::Result<Vec<Resource>> {
        let repository_filters: Vec<Filter> = filters
            .iter()
            .filter(|f| matches!(f.filter_type, FilterType::Name | FilterType::Resource))
            .cloned()
            .collect();

        let repositories: Vec<Resource> = self
            .list_repositories()
            .await?
            .into_iter()
            .map(|name| Resource::new(ResourceType::Image, name))
            .collect();
        let names: Vec<String> = apply_filters(repositories, &repository_filters)?
            .iter()
            .filter_map(|r| r.repository_name().map(ToString::to_string))
            .collect();

        let tag_lists = run_bounded(names, self.config.tag_list_concurrency, |name| async move {
            let tags = self.list_tags(&name).await?;
            Ok::<_, AdapterError>((name, tags))
        })
        .await?;

        let resources: Vec<Resource> = tag_lists
            .into_iter()
            .filter(|(_, tags)| !tags.is_empty())
            .map(|(name, tags)| {
                let mut resource = Resource::new(ResourceType::Image, name);
                for tag in tags {
                    resource = resource.with_artifact(
                        Artifact::default().with_type("image").with_tags([tag]),
                    );
                }
                resource.registry = Some(self.registry.clone());
                resource
            })
            .collect();

        let resources = apply_filters(resources, filters)?;
        debug!(registry = %self.registry.url, count = resources.len(), "fetched artifacts");
        Ok(resources)
    }

    async fn manifest_exists(
        &self,
        repository: &str,
        reference: &str,
    ) -> ferry_core::Result<(bool, Option<Descriptor>)> {
        let descriptor = self.head_manifest(repository, reference).await?;
        Ok((descriptor.is_some(), descriptor))
    }

    async fn delete_manifest(&self, repository: &str, reference: &str) -> ferry_core::Result<()> {
        if reference.contains(':') {
            return Ok(self.delete_by_digest(repository, reference).await?);
        }

        let Some(descriptor) = self.head_manifest(repository, reference).await? else {
            debug!(%repository, %reference, "manifest already absent");
            return Ok(());
        };
        if descriptor.digest.is_empty() {
            return Err(AdapterError::InvalidResponse {
                message: format!("registry returned no digest for {repository}:{reference}"),
            }
            .into());
        }
        Ok(self.delete_by_digest(repository, &descriptor.digest).await?)
    }
}

/// Factory for [`NativeAdapter`]s.
#[derive(Debug, Clone, Default)]
pub struct NativeFactory {
    config: NativeAdapterConfig,
}

impl NativeFactory {
    /// Creates a factory that builds adapters with the given configuration.
    #[must_use]
    pub const fn new(config: NativeAdapterConfig) -> Self {
        Self { config }
    }
}

impl AdapterFactory for NativeFactory {
    fn create(&self, registry: &Registry) -> Result<Box<dyn Adapter>> {
        Ok(Box::new(NativeAdapter::new(
            registry.clone(),
            self.config.clone(),
        )?))
    }
}

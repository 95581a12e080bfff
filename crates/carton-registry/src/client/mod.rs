//! HTTP client for registry lookups.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::debug;

use carton_core::error::CartonError;

use crate::api::VersionMetadata;
use crate::RegistryResult;

/// Default registry every lookup goes against unless overridden
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Timeout applied to every registry call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for registry metadata operations.
///
/// Failures are surfaced immediately; per the install pipeline's error
/// policy there is no retry layer here, the caller re-invokes the whole
/// operation instead.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Base registry URL
    base_url: String,
}

impl RegistryClient {
    /// Create a client against the default registry
    pub fn new() -> RegistryResult<Self> {
        Self::with_base_url(DEFAULT_REGISTRY)
    }

    /// Create a client against a specific registry (tests, mirrors)
    pub fn with_base_url(base_url: impl Into<String>) -> RegistryResult<Self> {
        let client = ClientBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .user_agent(concat!("carton/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                CartonError::network("Failed to create HTTP client".to_string(), e)
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The registry this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch metadata for a package at a literal version
    pub async fn package_metadata(
        &self,
        name: &str,
        version: &str,
    ) -> RegistryResult<VersionMetadata> {
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            encode_package_name(name),
            version
        );
        self.get_version_document(&url, &format!("{}@{}", name, version))
            .await
    }

    /// Fetch metadata for whatever the registry currently reports as the
    /// latest version of a package
    pub async fn latest_version(&self, name: &str) -> RegistryResult<VersionMetadata> {
        let url = format!("{}/{}/latest", self.base_url, encode_package_name(name));
        self.get_version_document(&url, name).await
    }

    async fn get_version_document(
        &self,
        url: &str,
        package: &str,
    ) -> RegistryResult<VersionMetadata> {
        debug!(%url, "registry lookup");
        let response = self.client.get(url).send().await.map_err(|e| {
            CartonError::network(format!("Registry request for '{}' failed", package), e)
        })?;

        match response.status() {
            StatusCode::OK => response.json::<VersionMetadata>().await.map_err(|e| {
                CartonError::network(
                    format!("Failed to parse registry response for '{}'", package),
                    e,
                )
            }),
            _ => Err(CartonError::PackageNotFound {
                name: package.to_string(),
            }),
        }
    }
}

/// Encode a package name for use in a registry URL path.
///
/// Scoped packages keep their `@` but the scope separator must be escaped:
/// `@types/node` becomes `@types%2fnode`.
fn encode_package_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2f")
    } else {
        name.to_string()
    }
}

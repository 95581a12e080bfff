//! Recursive dependency resolution for Carton.
//!
//! The resolver turns manifest constraints into a concrete, deduplicated
//! package graph merged into the shared lockfile. Constraints are either
//! literal versions, used as-is, or wants-latest ranges (`^`/`~` prefix),
//! translated through the registry's `latest` endpoint. There is no version
//! intersection or backtracking; when the same package ID is resolved more
//! than once in a pass, the last resolution wins.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use carton_core::error::CartonError;
use carton_core::types::PackageId;
use carton_lockfile::{Lockfile, Package};
use carton_registry::{MetadataCache, RegistryClient, VersionMetadata};

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, CartonError>;

/// The dependency resolver.
///
/// Holds the registry client and a metadata cache so repeated lookups for
/// the same version document within one pass cost one network call.
#[derive(Debug)]
pub struct Resolver {
    client: Arc<RegistryClient>,
    metadata: Arc<MetadataCache>,
}

impl Resolver {
    /// Create a resolver over a registry client and metadata cache
    pub fn new(client: Arc<RegistryClient>, metadata: Arc<MetadataCache>) -> Self {
        Self { client, metadata }
    }

    /// Resolve every manifest dependency and its transitive closure into
    /// the lockfile.
    ///
    /// One visited set spans the whole pass: each package ID is descended
    /// into at most once, which both deduplicates shared subtrees and
    /// closes cycles (re-encountering an in-flight ID simply stops the
    /// recursion). Any registry error aborts the pass; whatever was already
    /// merged stays in the in-memory lockfile and the caller decides
    /// whether to persist it.
    pub async fn resolve_all(
        &self,
        root_requests: &BTreeMap<String, String>,
        lockfile: &mut Lockfile,
    ) -> ResolverResult<()> {
        let mut visited = HashSet::new();
        for (name, constraint) in root_requests {
            self.resolve(
                name.clone(),
                constraint.clone(),
                root_requests,
                lockfile,
                &mut visited,
            )
            .await?;
        }
        debug!(
            packages = lockfile.packages.len(),
            roots = lockfile.root_deps.len(),
            "resolution pass complete"
        );
        Ok(())
    }

    /// Resolve one package and the subgraph reachable from it.
    ///
    /// Recursive and async, so the recursion goes through a boxed future.
    fn resolve<'a>(
        &'a self,
        name: String,
        constraint: String,
        root_requests: &'a BTreeMap<String, String>,
        lockfile: &'a mut Lockfile,
        visited: &'a mut HashSet<String>,
    ) -> Pin<Box<dyn Future<Output = ResolverResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let version = self.resolve_version(&name, &constraint).await?;
            let pkg_id = format!("{}@{}", name, version);

            // Manifest-level names always (re)point their root entry at the
            // chosen ID, even when the node itself was already resolved.
            if root_requests.contains_key(&name) {
                lockfile.root_deps.insert(name.clone(), pkg_id.clone());
            }

            if !visited.insert(pkg_id.clone()) {
                debug!(%pkg_id, "already resolved in this pass");
                return Ok(());
            }

            let metadata = self.version_document(&name, &version).await?;

            // Each declared range is itself translated to a literal version
            // before the edge is recorded.
            let mut new_deps: Vec<(String, String)> = Vec::new();
            for (dep_name, range) in &metadata.dependencies {
                let dep_version = self.resolve_version(dep_name, range).await?;
                new_deps.push((dep_name.clone(), format!("{}@{}", dep_name, dep_version)));
            }

            self.merge_package(&pkg_id, &name, &version, &metadata, &new_deps, lockfile);

            // Descend into the node's current edge set (deterministic: the
            // deps map is ordered by name).
            let dep_pairs: Vec<(String, String)> = lockfile
                .packages
                .get(&pkg_id)
                .map(|pkg| {
                    pkg.deps
                        .iter()
                        .map(|(n, id)| (n.clone(), id.clone()))
                        .collect()
                })
                .unwrap_or_default();

            for (dep_name, dep_id) in dep_pairs {
                let dep_version = PackageId::parse(&dep_id)
                    .map(|id| id.version)
                    .ok_or_else(|| CartonError::CorruptLockfile {
                        reason: format!(
                            "package '{}' has malformed dependency ID '{}'",
                            pkg_id, dep_id
                        ),
                    })?;
                self.resolve(dep_name, dep_version, root_requests, lockfile, visited)
                    .await?;
            }
            Ok(())
        })
    }

    /// Merge a resolution result into the lockfile under `pkg_id`.
    ///
    /// An existing node is refreshed in place: version and tarball URL are
    /// updated and deps entries present in the new response overwrite prior
    /// ones (names absent from the response are left alone). Integrity is
    /// never touched here; only the fetch engine writes it.
    fn merge_package(
        &self,
        pkg_id: &str,
        name: &str,
        version: &str,
        metadata: &VersionMetadata,
        new_deps: &[(String, String)],
        lockfile: &mut Lockfile,
    ) {
        match lockfile.packages.get_mut(pkg_id) {
            Some(pkg) => {
                pkg.version = version.to_string();
                pkg.tarball_url = metadata.dist.tarball.clone();
                for (dep_name, dep_id) in new_deps {
                    pkg.deps.insert(dep_name.clone(), dep_id.clone());
                }
            },
            None => {
                lockfile.packages.insert(
                    pkg_id.to_string(),
                    Package {
                        name: name.to_string(),
                        version: version.to_string(),
                        tarball_url: metadata.dist.tarball.clone(),
                        integrity: String::new(),
                        deps: new_deps.iter().cloned().collect(),
                    },
                );
            },
        }
    }

    /// Translate a constraint into a literal version.
    ///
    /// A `^` or `~` prefix means "whatever the registry currently calls
    /// latest"; anything else is taken verbatim.
    async fn resolve_version(&self, name: &str, constraint: &str) -> ResolverResult<String> {
        let constraint = constraint.trim();
        if constraint.starts_with('^') || constraint.starts_with('~') {
            let metadata = self.latest_document(name).await?;
            Ok(metadata.version)
        } else {
            Ok(constraint.to_string())
        }
    }

    async fn version_document(
        &self,
        name: &str,
        version: &str,
    ) -> ResolverResult<VersionMetadata> {
        let key = format!("{}/{}", name, version);
        if let Some(cached) = self.metadata.get(&key) {
            return Ok(cached);
        }
        let metadata = self.client.package_metadata(name, version).await?;
        self.metadata.insert(key, metadata.clone());
        Ok(metadata)
    }

    async fn latest_document(&self, name: &str) -> ResolverResult<VersionMetadata> {
        let key = format!("{}/latest", name);
        if let Some(cached) = self.metadata.get(&key) {
            return Ok(cached);
        }
        let metadata = self.client.latest_version(name).await?;
        self.metadata.insert(key, metadata.clone());
        Ok(metadata)
    }
}

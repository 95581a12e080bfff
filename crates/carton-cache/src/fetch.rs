//! Tarball download, verification and cache promotion.
//!
//! Per package the engine runs a small state machine: a pinned integrity
//! digest whose cache entry already exists short-circuits with no network
//! call; otherwise the tarball streams into a temp file through a sha512
//! accumulator, the digest is checked against any pinned value, and the
//! temp file is renamed onto its digest-derived cache path. The rename is
//! the commit point: a half-written download is never observable as a cache
//! entry, and a failed one is unlinked when the temp handle drops.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Client;
use sha2::{Digest, Sha512};
use tracing::{debug, info};

use carton_core::error::CartonError;
use carton_lockfile::Lockfile;

use crate::digest::{digest_filename, format_digest};
use crate::extract::CachedTarball;
use crate::CacheResult;

/// Timeout applied to every tarball download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15);

/// Extension given to every cached archive
const TARBALL_EXT: &str = "tgz";

/// Outcome of fetching a single package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Whether the archive was served from the cache without a download
    pub from_cache: bool,
    /// Canonical cache path of the verified archive
    pub path: Utf8PathBuf,
    /// Integrity digest of the archive
    pub digest: String,
}

/// Content-addressed tarball fetcher
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    cache_dir: Utf8PathBuf,
    tmp_dir: Utf8PathBuf,
}

impl Fetcher {
    /// Create a fetcher over the given cache and temp directories.
    ///
    /// Both directories are created if absent. They must live on the same
    /// filesystem: promotion is a rename from one into the other.
    pub fn new(
        cache_dir: impl AsRef<Utf8Path>,
        tmp_dir: impl AsRef<Utf8Path>,
    ) -> CacheResult<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        let tmp_dir = tmp_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            CartonError::io(format!("Failed to create cache directory {}", cache_dir), e)
        })?;
        std::fs::create_dir_all(&tmp_dir).map_err(|e| {
            CartonError::io(format!("Failed to create temp directory {}", tmp_dir), e)
        })?;

        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(concat!("carton/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CartonError::network("Failed to create HTTP client".to_string(), e))?;

        Ok(Self {
            client,
            cache_dir,
            tmp_dir,
        })
    }

    /// Canonical cache path for a digest
    fn cache_path(&self, digest: &str) -> Utf8PathBuf {
        self.cache_dir
            .join(format!("{}.{}", digest_filename(digest), TARBALL_EXT))
    }

    /// Ensure a verified archive for `pkg_id` exists in the cache and
    /// record its digest in the lockfile if none was pinned yet.
    pub async fn fetch(&self, pkg_id: &str, lockfile: &mut Lockfile) -> CacheResult<FetchOutcome> {
        let pkg = lockfile
            .package_for(pkg_id)
            .ok_or_else(|| CartonError::PackageDataMissing {
                id: pkg_id.to_string(),
            })?;

        // Pinned digest plus an existing cache entry: nothing to download.
        let pinned = pkg.integrity.clone();
        if !pinned.is_empty() {
            let path = self.cache_path(&pinned);
            if path.exists() {
                debug!(%pkg_id, %path, "cache hit");
                return Ok(FetchOutcome {
                    from_cache: true,
                    path,
                    digest: pinned,
                });
            }
        }

        let url = pkg.tarball_url.clone();
        if url.is_empty() {
            return Err(CartonError::MissingSource {
                id: pkg_id.to_string(),
            });
        }

        debug!(%pkg_id, %url, "downloading");
        let mut response = self.client.get(&url).send().await.map_err(|e| {
            CartonError::network(format!("Download of '{}' failed", pkg_id), e)
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CartonError::FetchFailed {
                package: pkg_id.to_string(),
                status: status.to_string(),
            });
        }

        // Stream into a temp file while hashing, one pass over the bytes.
        // The NamedTempFile unlinks itself on any early return below.
        let mut temp = tempfile::Builder::new()
            .prefix("download-")
            .suffix(&format!(".{}", TARBALL_EXT))
            .tempfile_in(&self.tmp_dir)
            .map_err(|e| CartonError::io("Failed to create temp download file".to_string(), e))?;
        let mut hasher = Sha512::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            CartonError::network(format!("Download of '{}' was interrupted", pkg_id), e)
        })? {
            hasher.update(&chunk);
            temp.write_all(&chunk).map_err(|e| {
                CartonError::io("Failed to write temp download file".to_string(), e)
            })?;
        }
        temp.flush()
            .map_err(|e| CartonError::io("Failed to flush temp download file".to_string(), e))?;

        let computed = format_digest(&hasher.finalize());

        // A pinned digest is a contract; a different download is tampering
        // or corruption, never something to silently re-pin.
        if !pinned.is_empty() && pinned != computed {
            return Err(CartonError::IntegrityMismatch {
                package: pkg_id.to_string(),
                expected: pinned,
                actual: computed,
            });
        }
        if pinned.is_empty() {
            if let Some(pkg) = lockfile.packages.get_mut(pkg_id) {
                pkg.integrity = computed.clone();
            }
            info!(%pkg_id, digest = %computed, "integrity pinned");
        }

        let cache_path = self.cache_path(&computed);
        if cache_path.exists() {
            // Byte-identical content was already promoted by an earlier
            // package; dropping the temp file discards the duplicate.
            debug!(%pkg_id, %cache_path, "content already cached");
            drop(temp);
        } else {
            temp.persist(&cache_path).map_err(|e| {
                CartonError::io(
                    format!("Failed to promote download into cache at {}", cache_path),
                    e.error,
                )
            })?;
        }

        Ok(FetchOutcome {
            from_cache: false,
            path: cache_path,
            digest: computed,
        })
    }

    /// Fetch every package in install order, then persist the lockfile with
    /// its newly pinned digests.
    ///
    /// The first failure aborts the pass; archives promoted before it stay
    /// cached, so a retry resumes where this run stopped. Returns the
    /// `(package name, cache path)` pairs in the order given, ready for
    /// extraction.
    pub async fn fetch_all(
        &self,
        order: &[String],
        lockfile: &mut Lockfile,
        lockfile_path: &Path,
    ) -> CacheResult<Vec<CachedTarball>> {
        let mut tarballs = Vec::with_capacity(order.len());
        for pkg_id in order {
            let outcome = self.fetch(pkg_id, lockfile).await?;
            let name = lockfile
                .package_for(pkg_id)
                .map(|pkg| pkg.name.clone())
                .ok_or_else(|| CartonError::PackageDataMissing {
                    id: pkg_id.to_string(),
                })?;
            tarballs.push(CachedTarball {
                name,
                path: outcome.path,
            });
        }
        lockfile.save_sealed(lockfile_path)?;
        Ok(tarballs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::compute_digest;
    use carton_lockfile::Package;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TARBALL_BYTES: &[u8] = b"pretend this is a gzipped tarball";

    struct Fixture {
        _root: tempfile::TempDir,
        cache_dir: Utf8PathBuf,
        tmp_dir: Utf8PathBuf,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).unwrap();
        Fixture {
            cache_dir: base.join("cache/tarballs"),
            tmp_dir: base.join("tmp"),
            _root: root,
        }
    }

    fn lockfile_with(pkg_id: &str, tarball_url: &str, integrity: &str) -> Lockfile {
        let mut lf = Lockfile::new("https://registry.test");
        let (name, version) = pkg_id.rsplit_once('@').unwrap();
        lf.packages.insert(
            pkg_id.to_string(),
            Package {
                name: name.to_string(),
                version: version.to_string(),
                tarball_url: tarball_url.to_string(),
                integrity: integrity.to_string(),
                deps: BTreeMap::new(),
            },
        );
        lf.root_deps.insert(name.to_string(), pkg_id.to_string());
        lf
    }

    fn tmp_entries(dir: &Utf8Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_download_pins_integrity_and_promotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/left-pad.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(TARBALL_BYTES))
            .mount(&server)
            .await;

        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();
        let mut lf = lockfile_with(
            "left-pad@1.3.0",
            &format!("{}/left-pad.tgz", server.uri()),
            "",
        );

        let outcome = fetcher.fetch("left-pad@1.3.0", &mut lf).await.unwrap();
        assert!(!outcome.from_cache);
        assert_eq!(outcome.digest, compute_digest(TARBALL_BYTES));
        assert_eq!(
            std::fs::read(&outcome.path).unwrap(),
            TARBALL_BYTES.to_vec()
        );
        assert_eq!(
            lf.package_for("left-pad@1.3.0").unwrap().integrity,
            outcome.digest
        );
        assert_eq!(tmp_entries(&fx.tmp_dir), 0);
    }

    #[tokio::test]
    async fn test_pinned_digest_with_cache_entry_skips_network() {
        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();

        let digest = compute_digest(TARBALL_BYTES);
        let cached = fx.cache_dir.join(format!("{}.tgz", digest_filename(&digest)));
        std::fs::write(&cached, TARBALL_BYTES).unwrap();

        // The tarball URL points nowhere routable; a network attempt would
        // error out, so success proves the cache short-circuit.
        let mut lf = lockfile_with(
            "left-pad@1.3.0",
            "http://127.0.0.1:1/unreachable.tgz",
            &digest,
        );
        let outcome = fetcher.fetch("left-pad@1.3.0", &mut lf).await.unwrap();
        assert!(outcome.from_cache);
        assert_eq!(outcome.path, cached);
    }

    #[tokio::test]
    async fn test_tampered_content_is_rejected_without_residue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/evil.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tampered bytes".as_slice()))
            .mount(&server)
            .await;

        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();
        let pinned = compute_digest(TARBALL_BYTES);
        let mut lf = lockfile_with(
            "left-pad@1.3.0",
            &format!("{}/evil.tgz", server.uri()),
            &pinned,
        );

        let err = fetcher.fetch("left-pad@1.3.0", &mut lf).await.unwrap_err();
        assert!(matches!(err, CartonError::IntegrityMismatch { .. }));
        // The pinned value is untouched and nothing leaked into tmp or cache
        assert_eq!(lf.package_for("left-pad@1.3.0").unwrap().integrity, pinned);
        assert_eq!(tmp_entries(&fx.tmp_dir), 0);
        assert_eq!(tmp_entries(&fx.cache_dir), 0);
    }

    #[tokio::test]
    async fn test_identical_content_shares_one_cache_entry() {
        let server = MockServer::start().await;
        for route in ["/a.tgz", "/b.tgz"] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(TARBALL_BYTES))
                .mount(&server)
                .await;
        }

        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();

        let mut lf = Lockfile::new("https://registry.test");
        for (name, route) in [("a", "/a.tgz"), ("b", "/b.tgz")] {
            lf.packages.insert(
                format!("{}@1.0.0", name),
                Package {
                    name: name.to_string(),
                    version: "1.0.0".to_string(),
                    tarball_url: format!("{}{}", server.uri(), route),
                    integrity: String::new(),
                    deps: BTreeMap::new(),
                },
            );
        }

        fetcher.fetch("a@1.0.0", &mut lf).await.unwrap();
        fetcher.fetch("b@1.0.0", &mut lf).await.unwrap();
        assert_eq!(tmp_entries(&fx.cache_dir), 1);
        assert_eq!(tmp_entries(&fx.tmp_dir), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_status_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.tgz"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();
        let mut lf = lockfile_with("gone@1.0.0", &format!("{}/gone.tgz", server.uri()), "");

        let err = fetcher.fetch("gone@1.0.0", &mut lf).await.unwrap_err();
        assert!(
            matches!(err, CartonError::FetchFailed { ref package, ref status }
                if package == "gone@1.0.0" && status.contains("500"))
        );
    }

    #[tokio::test]
    async fn test_empty_tarball_url_is_missing_source() {
        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();
        let mut lf = lockfile_with("hollow@1.0.0", "", "");

        let err = fetcher.fetch("hollow@1.0.0", &mut lf).await.unwrap_err();
        assert!(matches!(err, CartonError::MissingSource { .. }));
    }

    #[tokio::test]
    async fn test_unknown_package_id_is_missing_data() {
        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();
        let mut lf = Lockfile::new("https://registry.test");

        let err = fetcher.fetch("ghost@1.0.0", &mut lf).await.unwrap_err();
        assert!(matches!(err, CartonError::PackageDataMissing { .. }));
    }

    #[tokio::test]
    async fn test_fetch_all_persists_sealed_lockfile_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/leaf.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"leaf".as_slice()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/app.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"app".as_slice()))
            .mount(&server)
            .await;

        let fx = fixture();
        let fetcher = Fetcher::new(&fx.cache_dir, &fx.tmp_dir).unwrap();

        let mut lf = Lockfile::new("https://registry.test");
        lf.packages.insert(
            "leaf@1.0.0".to_string(),
            Package {
                name: "leaf".to_string(),
                version: "1.0.0".to_string(),
                tarball_url: format!("{}/leaf.tgz", server.uri()),
                integrity: String::new(),
                deps: BTreeMap::new(),
            },
        );
        lf.packages.insert(
            "app@1.0.0".to_string(),
            Package {
                name: "app".to_string(),
                version: "1.0.0".to_string(),
                tarball_url: format!("{}/app.tgz", server.uri()),
                integrity: String::new(),
                deps: [("leaf".to_string(), "leaf@1.0.0".to_string())]
                    .into_iter()
                    .collect(),
            },
        );
        lf.root_deps
            .insert("app".to_string(), "app@1.0.0".to_string());

        let lockfile_path = fx._root.path().join("carton.lock");
        let order = vec!["leaf@1.0.0".to_string(), "app@1.0.0".to_string()];
        let tarballs = fetcher
            .fetch_all(&order, &mut lf, &lockfile_path)
            .await
            .unwrap();

        let names: Vec<&str> = tarballs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["leaf", "app"]);

        let persisted = Lockfile::load(&lockfile_path).unwrap();
        assert!(persisted.validate_sealed().is_ok());
        assert_eq!(
            persisted.package_for("leaf@1.0.0").unwrap().integrity,
            compute_digest(b"leaf")
        );
    }
}

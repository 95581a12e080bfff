//! Lockfile data model and structural validation.
//!
//! The lockfile is the single shared artifact threading the whole install
//! pipeline together: the resolver merges packages into it, the walker
//! orders it, and the fetch engine pins integrity digests into it. Every
//! persist is preceded by validation so corrupt state never reaches disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use carton_core::error::CartonError;
use serde::{Deserialize, Serialize};

use crate::LockResult;

/// The resolved, persisted dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    /// Lockfile format version, must be >= 1
    #[serde(rename = "lockfileVersion")]
    pub lock_version: u32,

    /// Registry the graph was resolved against (informational)
    pub registry: String,

    /// Manifest-level dependency name -> package ID
    #[serde(rename = "rootDeps", default)]
    pub root_deps: BTreeMap<String, String>,

    /// Package ID -> resolved package, covering every node in the graph
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,
}

/// One resolved dependency node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,

    /// Source location of the package archive
    #[serde(rename = "tarballURL", default)]
    pub tarball_url: String,

    /// Algorithm-prefixed digest of the archive bytes, e.g. `sha512-...`.
    /// Empty until the fetch engine has hashed a download.
    #[serde(default)]
    pub integrity: String,

    /// Dependency name -> package ID chosen for it, scoped to this package
    #[serde(default)]
    pub deps: BTreeMap<String, String>,
}

impl Lockfile {
    /// Create a fresh, empty lockfile for the given registry
    pub fn new(registry: impl Into<String>) -> Self {
        Self {
            lock_version: 1,
            registry: registry.into(),
            root_deps: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }

    /// Read and structurally validate a persisted lockfile.
    ///
    /// A missing file is surfaced as an `Io` error; callers that want a
    /// fresh-project default are responsible for checking existence and
    /// constructing `Lockfile::new` themselves.
    pub fn load(path: &Path) -> LockResult<Self> {
        let bytes = fs::read_to_string(path).map_err(|e| {
            CartonError::io(format!("Failed to read lockfile {}", path.display()), e)
        })?;
        let lf: Lockfile = serde_json::from_str(&bytes).map_err(|e| {
            CartonError::CorruptLockfile {
                reason: format!("not valid lockfile JSON: {}", e),
            }
        })?;
        lf.validate()?;
        Ok(lf)
    }

    /// Check the structural invariants that hold at every lifecycle stage:
    /// version >= 1, no dangling root or dep references, every package keyed
    /// by its own `name@version`, names and versions non-empty.
    ///
    /// Violations are reported first-wins in a deterministic scan order:
    /// root dependencies, then packages in map order, then each package's
    /// deps.
    pub fn validate(&self) -> LockResult<()> {
        self.validate_inner(false)
    }

    /// `validate` plus the post-acquisition invariant: every package carries
    /// a non-empty tarball URL and integrity digest. Used for the persist
    /// that follows a successful fetch pass; integrity is legitimately
    /// empty before that.
    pub fn validate_sealed(&self) -> LockResult<()> {
        self.validate_inner(true)
    }

    fn validate_inner(&self, sealed: bool) -> LockResult<()> {
        if self.lock_version < 1 {
            return Err(corrupt(format!(
                "lockfileVersion must be >= 1, got {}",
                self.lock_version
            )));
        }

        for (name, pkg_id) in &self.root_deps {
            let pkg = self.packages.get(pkg_id).ok_or_else(|| {
                corrupt(format!(
                    "root dependency '{}' points to missing package '{}'",
                    name, pkg_id
                ))
            })?;
            if &pkg.name != name {
                return Err(corrupt(format!(
                    "root dependency '{}' points to package named '{}'",
                    name, pkg.name
                )));
            }
        }

        for (pkg_id, pkg) in &self.packages {
            if pkg.name.is_empty() || pkg.version.is_empty() {
                return Err(corrupt(format!(
                    "package '{}' has an empty name or version",
                    pkg_id
                )));
            }
            let expected_id = format!("{}@{}", pkg.name, pkg.version);
            if pkg_id != &expected_id {
                return Err(corrupt(format!(
                    "package key '{}' does not match '{}'",
                    pkg_id, expected_id
                )));
            }
            if sealed {
                if pkg.tarball_url.is_empty() {
                    return Err(corrupt(format!(
                        "package '{}' is missing its tarball URL",
                        pkg_id
                    )));
                }
                if pkg.integrity.is_empty() {
                    return Err(corrupt(format!(
                        "package '{}' is missing its integrity digest",
                        pkg_id
                    )));
                }
            }
            for (dep_name, dep_id) in &pkg.deps {
                let dep = self.packages.get(dep_id).ok_or_else(|| {
                    corrupt(format!(
                        "package '{}' depends on missing package '{}'",
                        pkg_id, dep_id
                    ))
                })?;
                if &dep.name != dep_name {
                    return Err(corrupt(format!(
                        "package '{}' dependency name mismatch: expected '{}', got '{}'",
                        pkg_id, dep_name, dep.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Validate then serialize to pretty JSON
    pub fn encode(&self) -> LockResult<String> {
        self.validate()?;
        self.encode_unchecked()
    }

    fn encode_unchecked(&self) -> LockResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CartonError::JsonParse {
            message: format!("failed to serialize lockfile: {}", e),
        })
    }

    /// Validate and persist; the write goes through a sibling temp file and
    /// a rename so a crash mid-write cannot leave a torn lockfile behind.
    pub fn save(&self, path: &Path) -> LockResult<()> {
        let encoded = self.encode()?;
        self.write_atomic(path, &encoded)
    }

    /// Like `save`, but enforcing the post-acquisition invariants
    pub fn save_sealed(&self, path: &Path) -> LockResult<()> {
        self.validate_sealed()?;
        let encoded = self.encode_unchecked()?;
        self.write_atomic(path, &encoded)
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> LockResult<()> {
        let tmp_path = path.with_extension("lock.tmp");
        fs::write(&tmp_path, contents).map_err(|e| {
            CartonError::io(format!("Failed to write {}", tmp_path.display()), e)
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            CartonError::io(format!("Failed to replace {}", path.display()), e)
        })?;
        tracing::debug!(path = %path.display(), "lockfile persisted");
        Ok(())
    }

    /// Look up a package by its ID
    pub fn package_for(&self, pkg_id: &str) -> Option<&Package> {
        self.packages.get(pkg_id)
    }

    /// Package IDs selected by the root dependencies, sorted for
    /// reproducible iteration (they are map values; key order does not
    /// order them)
    pub fn root_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.root_deps.values().cloned().collect();
        ids.sort();
        ids
    }

    /// Package IDs a package depends on, sorted; `None` when the package
    /// itself is unknown
    pub fn dep_ids(&self, pkg_id: &str) -> Option<Vec<String>> {
        let pkg = self.packages.get(pkg_id)?;
        let mut ids: Vec<String> = pkg.deps.values().cloned().collect();
        ids.sort();
        Some(ids)
    }
}

fn corrupt(reason: String) -> CartonError {
    CartonError::CorruptLockfile { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, version: &str) -> Package {
        Package {
            name: name.to_string(),
            version: version.to_string(),
            tarball_url: format!("https://registry.test/{}/-/{}-{}.tgz", name, name, version),
            integrity: String::new(),
            deps: BTreeMap::new(),
        }
    }

    fn sample() -> Lockfile {
        let mut lf = Lockfile::new("https://registry.test");
        lf.packages.insert("left-pad@1.3.0".into(), leaf("left-pad", "1.3.0"));
        lf.root_deps.insert("left-pad".into(), "left-pad@1.3.0".into());
        lf
    }

    #[test]
    fn test_fresh_lockfile_is_valid() {
        assert!(Lockfile::new("https://registry.test").validate().is_ok());
    }

    #[test]
    fn test_valid_graph_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_version() {
        let mut lf = sample();
        lf.lock_version = 0;
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("lockfileVersion"));
    }

    #[test]
    fn test_rejects_dangling_root_reference() {
        let mut lf = sample();
        lf.root_deps.insert("ghost".into(), "ghost@1.0.0".into());
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("missing package 'ghost@1.0.0'"));
    }

    #[test]
    fn test_rejects_root_name_mismatch() {
        let mut lf = sample();
        lf.root_deps.insert("alias".into(), "left-pad@1.3.0".into());
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("points to package named 'left-pad'"));
    }

    #[test]
    fn test_rejects_key_id_mismatch() {
        let mut lf = sample();
        lf.packages.insert("wrong@9.9.9".into(), leaf("wrong", "1.0.0"));
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("does not match 'wrong@1.0.0'"));
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut lf = sample();
        lf.packages.insert("@1.0.0".into(), leaf("", "1.0.0"));
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("empty name or version"));
    }

    #[test]
    fn test_rejects_dangling_dep_edge() {
        let mut lf = sample();
        lf.packages
            .get_mut("left-pad@1.3.0")
            .unwrap()
            .deps
            .insert("gone".into(), "gone@0.1.0".into());
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("depends on missing package"));
    }

    #[test]
    fn test_rejects_dep_name_mismatch() {
        let mut lf = sample();
        lf.packages.insert("other@2.0.0".into(), leaf("other", "2.0.0"));
        lf.packages
            .get_mut("left-pad@1.3.0")
            .unwrap()
            .deps
            .insert("misnamed".into(), "other@2.0.0".into());
        let err = lf.validate().unwrap_err();
        assert!(err.to_string().contains("dependency name mismatch"));
    }

    #[test]
    fn test_cycles_are_legal() {
        let mut lf = Lockfile::new("https://registry.test");
        let mut a = leaf("a", "1.0.0");
        a.deps.insert("b".into(), "b@1.0.0".into());
        let mut b = leaf("b", "1.0.0");
        b.deps.insert("a".into(), "a@1.0.0".into());
        lf.packages.insert("a@1.0.0".into(), a);
        lf.packages.insert("b@1.0.0".into(), b);
        lf.root_deps.insert("a".into(), "a@1.0.0".into());
        assert!(lf.validate().is_ok());
    }

    #[test]
    fn test_sealed_requires_integrity() {
        let lf = sample();
        assert!(lf.validate().is_ok());
        let err = lf.validate_sealed().unwrap_err();
        assert!(err.to_string().contains("integrity"));

        let mut sealed = sample();
        sealed.packages.get_mut("left-pad@1.3.0").unwrap().integrity =
            "sha512-abc".to_string();
        assert!(sealed.validate_sealed().is_ok());
    }

    #[test]
    fn test_sealed_requires_tarball_url() {
        let mut lf = sample();
        let pkg = lf.packages.get_mut("left-pad@1.3.0").unwrap();
        pkg.tarball_url.clear();
        pkg.integrity = "sha512-abc".to_string();
        let err = lf.validate_sealed().unwrap_err();
        assert!(err.to_string().contains("tarball URL"));
    }

    #[test]
    fn test_encode_refuses_corrupt_state() {
        let mut lf = sample();
        lf.root_deps.insert("ghost".into(), "ghost@1.0.0".into());
        assert!(matches!(
            lf.encode(),
            Err(CartonError::CorruptLockfile { .. })
        ));
    }

    #[test]
    fn test_wire_field_names() {
        let encoded = sample().encode().unwrap();
        assert!(encoded.contains("\"lockfileVersion\""));
        assert!(encoded.contains("\"rootDeps\""));
        assert!(encoded.contains("\"tarballURL\""));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carton.lock");

        let lf = sample();
        lf.save(&path).unwrap();
        let loaded = Lockfile::load(&path).unwrap();
        assert_eq!(lf, loaded);
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carton.lock");
        std::fs::write(
            &path,
            r#"{"lockfileVersion":1,"registry":"r","rootDeps":{"x":"x@1.0.0"},"packages":{}}"#,
        )
        .unwrap();
        assert!(matches!(
            Lockfile::load(&path),
            Err(CartonError::CorruptLockfile { .. })
        ));
    }

    #[test]
    fn test_root_and_dep_ids_are_sorted() {
        let mut lf = Lockfile::new("https://registry.test");
        for name in ["zeta", "alpha", "mid"] {
            lf.packages.insert(format!("{}@1.0.0", name), leaf(name, "1.0.0"));
        }
        let mut parent = leaf("parent", "1.0.0");
        parent.deps.insert("zeta".into(), "zeta@1.0.0".into());
        parent.deps.insert("alpha".into(), "alpha@1.0.0".into());
        parent.deps.insert("mid".into(), "mid@1.0.0".into());
        lf.packages.insert("parent@1.0.0".into(), parent);
        lf.root_deps.insert("parent".into(), "parent@1.0.0".into());
        lf.root_deps.insert("zeta".into(), "zeta@1.0.0".into());

        assert_eq!(lf.root_ids(), vec!["parent@1.0.0", "zeta@1.0.0"]);
        assert_eq!(
            lf.dep_ids("parent@1.0.0").unwrap(),
            vec!["alpha@1.0.0", "mid@1.0.0", "zeta@1.0.0"]
        );
        assert!(lf.dep_ids("nope@1.0.0").is_none());
    }
}

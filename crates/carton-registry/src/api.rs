//! Registry API response types.
//!
//! Shapes mirror the npm version endpoint: `GET {registry}/{name}/{version}`
//! and `GET {registry}/{name}/latest` both return one version document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata for a single package version
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VersionMetadata {
    /// Package name
    pub name: String,
    /// Literal version string
    pub version: String,
    /// Distribution information
    pub dist: DistInfo,
    /// Dependency name -> version constraint. Ordered map so resolver
    /// iteration is deterministic without an extra sort.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// Distribution information for a package tarball
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DistInfo {
    /// Tarball download URL
    pub tarball: String,
    /// Registry-reported subresource integrity. Informational only: the
    /// lockfile pins digests computed locally by the fetch engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

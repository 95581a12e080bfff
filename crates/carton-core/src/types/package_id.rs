//! Package identifier type.
//!
//! A package ID is the string `<name>@<version>`. It is the single stable
//! key under which a resolved package appears in the lockfile, both as a map
//! key and as an edge target.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a resolved package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    /// Package name (e.g., "lodash" or "@types/node")
    pub name: String,
    /// Resolved literal version
    pub version: String,
}

impl PackageId {
    /// Create a new package ID from name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse an ID string of the form `<name>@<version>`.
    ///
    /// The split happens at the *last* `@`, so scoped names like
    /// `@types/node@20.1.0` keep their leading `@` intact. Returns `None`
    /// when either half would be empty.
    pub fn parse(id: &str) -> Option<Self> {
        let (name, version) = id.rsplit_once('@')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }

    /// Render the map-key form `<name>@<version>`
    pub fn as_key(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

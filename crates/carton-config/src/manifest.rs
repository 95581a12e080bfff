//! `carton.json` parsing and serialization.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use carton_core::error::CartonError;
use serde::{Deserialize, Serialize};

use crate::ConfigResult;

/// Fallback project name when none is configured
const DEFAULT_NAME: &str = "my-project";

/// Project manifest: the user-owned description of direct dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Project name
    pub name: String,

    /// Monotonic project version
    pub version: u32,

    /// Dependency name -> version constraint. A constraint is either a
    /// literal version ("1.3.0") or a wants-latest range ("^1.3.0", "~1.3.0").
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Create a manifest for a new project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            dependencies: BTreeMap::new(),
        }
    }

    /// Load a manifest from disk, normalizing degenerate fields the way a
    /// hand-edited file tends to need: empty name falls back to
    /// `my-project`, a zero version becomes 1.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let bytes = fs::read_to_string(path).map_err(|e| {
            CartonError::io(format!("Failed to read manifest {}", path.display()), e)
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&bytes).map_err(|e| CartonError::JsonParse {
                message: format!("invalid manifest {}: {}", path.display(), e),
            })?;

        if manifest.name.is_empty() {
            manifest.name = DEFAULT_NAME.to_string();
        }
        if manifest.version == 0 {
            manifest.version = 1;
        }
        Ok(manifest)
    }

    /// Load the manifest at `path`, or a fresh default when the file does
    /// not exist yet
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(DEFAULT_NAME))
        }
    }

    /// Persist as pretty JSON
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let encoded =
            serde_json::to_string_pretty(self).map_err(|e| CartonError::JsonParse {
                message: format!("failed to serialize manifest: {}", e),
            })?;
        fs::write(path, encoded).map_err(|e| {
            CartonError::io(format!("Failed to write manifest {}", path.display()), e)
        })
    }

    /// Record a dependency at a pinned version, overwriting any previous
    /// constraint for the same name
    pub fn add_dependency(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.dependencies.insert(name.into(), version.into());
    }
}

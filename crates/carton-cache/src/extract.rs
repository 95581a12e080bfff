//! Safe tarball extraction into the workspace.
//!
//! Archives come from third parties, so every entry's stored name is
//! validated before any write: the name is resolved component-wise against
//! the destination and must land inside it. Symlink, hardlink and device
//! entries are skipped outright; honoring them from an untrusted archive is
//! itself a traversal vector.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use camino::Utf8PathBuf;
use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::debug;

use carton_core::error::CartonError;

use crate::CacheResult;

/// A verified archive in the cache, tagged with the package name that owns
/// it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTarball {
    /// Package name; extraction lands in `<dest_root>/<name>`
    pub name: String,
    /// Cache path of the archive
    pub path: Utf8PathBuf,
}

/// Extract every archive into `<dest_root>/<package name>`.
///
/// All-or-nothing: the first failure removes the entire destination root
/// before the error propagates, so a partially materialized workspace is
/// never left behind.
pub fn extract_all(dest_root: &Path, tarballs: &[CachedTarball]) -> CacheResult<()> {
    for tarball in tarballs {
        let dest = dest_root.join(&tarball.name);
        if let Err(err) = extract(tarball.path.as_std_path(), &dest) {
            let _ = fs::remove_dir_all(dest_root);
            return Err(err);
        }
        debug!(name = %tarball.name, "extracted");
    }
    Ok(())
}

/// Stream one gzipped tarball into `dest`
pub fn extract(src: &Path, dest: &Path) -> CacheResult<()> {
    let file = File::open(src)
        .map_err(|e| CartonError::io(format!("Failed to open archive {}", src.display()), e))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    fs::create_dir_all(dest).map_err(|e| {
        CartonError::io(format!("Failed to create {}", dest.display()), e)
    })?;

    let entries = archive
        .entries()
        .map_err(|e| CartonError::io("Failed to read archive".to_string(), e))?;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| CartonError::io("Failed to read archive entry".to_string(), e))?;
        let entry_path = entry
            .path()
            .map_err(|e| CartonError::io("Archive entry has unreadable path".to_string(), e))?
            .into_owned();
        let target = safe_entry_path(&entry_path, dest)?;
        let mode = entry.header().mode().ok();

        match entry.header().entry_type() {
            EntryType::Directory => {
                if !target.exists() {
                    fs::create_dir_all(&target).map_err(|e| {
                        CartonError::io(format!("Failed to create {}", target.display()), e)
                    })?;
                    set_mode(&target, mode);
                }
            },
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        CartonError::io(format!("Failed to create {}", parent.display()), e)
                    })?;
                }
                let mut out = File::create(&target).map_err(|e| {
                    CartonError::io(format!("Failed to create {}", target.display()), e)
                })?;
                io::copy(&mut entry, &mut out).map_err(|e| {
                    CartonError::io(format!("Failed to write {}", target.display()), e)
                })?;
                set_mode(&target, mode);
            },
            other => {
                // Symlinks, hardlinks, devices: deliberately not materialized
                debug!(entry = %entry_path.display(), ?other, "skipping entry type");
            },
        }
    }
    Ok(())
}

/// Resolve an entry's stored name against the destination directory.
///
/// Components are folded lexically: `..` pops a previously accepted
/// component and fails once it would climb past the destination itself;
/// absolute names fail outright. The result is always inside `dest`.
fn safe_entry_path(entry_path: &Path, dest: &Path) -> CacheResult<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(name) => parts.push(name),
            Component::CurDir => {},
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(traversal(entry_path));
                }
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(traversal(entry_path));
            },
        }
    }

    let target = parts.iter().fold(dest.to_path_buf(), |p, c| p.join(c));
    if !target.starts_with(dest) {
        return Err(traversal(entry_path));
    }
    Ok(target)
}

fn traversal(entry_path: &Path) -> CartonError {
    CartonError::PathTraversal {
        entry: entry_path.display().to_string(),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) {}

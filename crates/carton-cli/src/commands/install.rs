//! `carton install` command implementation.
//!
//! Runs the whole pipeline: manifest -> resolver -> lockfile -> install
//! order -> fetch/verify/cache -> extraction into `carton_modules/`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;

use carton_cache::{extract_all, Fetcher};
use carton_config::Manifest;
use carton_core::error::{CartonError, CartonResult};
use carton_lockfile::{walk_all, Lockfile};
use carton_registry::{MetadataCache, RegistryClient};
use carton_resolver::Resolver;

use super::{CommandContext, CACHE_DIR, MODULES_DIR, TMP_DIR};

/// Execute the `carton install` command
pub async fn execute(ctx: &CommandContext) -> CartonResult<()> {
    let start = Instant::now();
    ctx.output.step("📦", "Installing dependencies");

    let client = Arc::new(RegistryClient::new()?);
    let installed = run_install(client, ctx).await?;

    ctx.output.success(&format!(
        "Installed {} packages in {:.2}s",
        installed,
        start.elapsed().as_secs_f64()
    ));
    Ok(())
}

/// Drive one full install against the project rooted at the context's
/// working directory.
///
/// Split out from `execute` so the pipeline can be exercised against a
/// local registry in tests. Returns the number of packages installed.
pub async fn run_install(client: Arc<RegistryClient>, ctx: &CommandContext) -> CartonResult<usize> {
    let cwd = ctx.cwd.as_path();
    let manifest_path = ctx.manifest_path();
    if !manifest_path.exists() {
        return Err(CartonError::ConfigValidation {
            field: super::MANIFEST_FILE.to_string(),
            reason: "not found; run `carton init` first".to_string(),
        });
    }
    let manifest = Manifest::load(&manifest_path)?;

    if manifest.dependencies.is_empty() {
        ctx.output.info("No dependencies to install");
        return Ok(0);
    }

    // Load the persisted graph, or start fresh for a new project
    let lockfile_path = ctx.lockfile_path();
    let mut lockfile = if lockfile_path.exists() {
        Lockfile::load(&lockfile_path)?
    } else {
        Lockfile::new(client.base_url())
    };

    ctx.output.step("🔍", "Resolving dependency graph");
    let resolver = Resolver::new(client, Arc::new(MetadataCache::new()));
    resolver
        .resolve_all(&manifest.dependencies, &mut lockfile)
        .await?;
    lockfile.save(&lockfile_path)?;

    let order = walk_all(&lockfile, &lockfile.root_ids())?;
    ctx.output
        .info(&format!("Resolved {} packages", order.len()));

    ctx.output.step("📥", "Fetching packages");
    let fetcher = Fetcher::new(
        utf8_path(cwd, CACHE_DIR)?,
        utf8_path(cwd, TMP_DIR)?,
    )?;
    let tarballs = fetcher
        .fetch_all(&order, &mut lockfile, &lockfile_path)
        .await?;

    ctx.output.step("🗂️", "Unpacking into carton_modules");
    extract_all(&cwd.join(MODULES_DIR), &tarballs)?;

    Ok(order.len())
}

fn utf8_path(cwd: &Path, relative: &str) -> CartonResult<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(cwd.join(relative)).map_err(|p| {
        CartonError::ConfigValidation {
            field: "path".to_string(),
            reason: format!("project path {} is not valid UTF-8", p.display()),
        }
    })
}

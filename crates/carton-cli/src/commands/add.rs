//! `carton add` command implementation.
//!
//! Validates a package against the registry and pins its literal version
//! into the manifest.

use carton_config::Manifest;
use carton_core::error::CartonResult;
use carton_registry::RegistryClient;

use super::CommandContext;

/// Execute the `carton add` command
pub async fn execute(package: String, ctx: &CommandContext) -> CartonResult<()> {
    let (name, version) = split_spec(&package);

    let client = RegistryClient::new()?;
    let metadata = match version {
        Some(version) => client.package_metadata(name, version).await?,
        None => client.latest_version(name).await?,
    };

    let manifest_path = ctx.manifest_path();
    let mut manifest = Manifest::load_or_default(&manifest_path)?;
    manifest.add_dependency(metadata.name.clone(), metadata.version.clone());
    manifest.save(&manifest_path)?;

    ctx.output
        .success(&format!("Added {}@{}", metadata.name, metadata.version));
    Ok(())
}

/// Split a `name[@version]` spec at the last `@`, leaving scoped names like
/// `@types/node` whole when no version is given
fn split_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() => (name, Some(version)),
        _ => (spec, None),
    }
}

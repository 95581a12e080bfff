//! `carton init` command implementation.

use carton_config::Manifest;
use carton_core::error::CartonResult;

use super::CommandContext;

/// Execute the `carton init` command
pub async fn execute(name: Option<String>, ctx: &CommandContext) -> CartonResult<()> {
    let manifest_path = ctx.manifest_path();
    if manifest_path.exists() {
        ctx.output
            .info("carton.json already exists, skipping initialization");
        return Ok(());
    }

    let manifest = Manifest::new(name.unwrap_or_else(|| "my-project".to_string()));
    manifest.save(&manifest_path)?;

    ctx.output
        .success(&format!("Initialized project '{}'", manifest.name));
    ctx.output.info("");
    ctx.output.info("Next steps:");
    ctx.output.info("  carton add <package>");
    ctx.output.info("  carton install");
    Ok(())
}

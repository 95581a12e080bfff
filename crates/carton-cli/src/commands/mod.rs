//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking a `CommandContext`. The context
//! also owns the project's fixed file layout: manifest and lockfile at the
//! project root, tarball cache and temp space under `.carton/`, extracted
//! packages under `carton_modules/`.

use std::path::PathBuf;

use tracing::info;

use carton_core::error::{CartonError, CartonResult};

pub mod add;
pub mod init;
pub mod install;


use crate::output::OutputHandler;
use crate::Commands;

/// Manifest filename at the project root
pub const MANIFEST_FILE: &str = "carton.json";
/// Lockfile filename at the project root
pub const LOCKFILE_FILE: &str = "carton.lock";
/// Content-addressed tarball cache, relative to the project root
pub const CACHE_DIR: &str = ".carton/cache/tarballs";
/// In-flight download space; must share a filesystem with the cache
pub const TMP_DIR: &str = ".carton/tmp";
/// Extraction root for installed packages
pub const MODULES_DIR: &str = "carton_modules";

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: PathBuf,
    pub output: OutputHandler,
}

impl CommandContext {
    /// Create a context rooted at the current directory
    pub async fn new() -> CartonResult<Self> {
        let cwd = std::env::current_dir().map_err(|e| {
            CartonError::io("Failed to get current directory".to_string(), e)
        })?;
        Ok(Self::at(cwd))
    }

    /// Create a context rooted at an explicit directory
    pub fn at(cwd: PathBuf) -> Self {
        Self {
            cwd,
            output: OutputHandler::new(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.cwd.join(MANIFEST_FILE)
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.cwd.join(LOCKFILE_FILE)
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> CartonResult<()> {
    match command {
        Commands::Init { name } => {
            info!("Initializing project");
            init::execute(name, ctx).await
        },
        Commands::Add { package } => {
            info!("Adding dependency: {}", package);
            add::execute(package, ctx).await
        },
        Commands::Install => {
            info!("Installing dependencies");
            install::execute(ctx).await
        },
    }
}

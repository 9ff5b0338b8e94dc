use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::LedgerConfig;

/// Options for `ledgerlens init-config`.
pub struct InitConfig {
    /// Print what would be written without touching the filesystem.
    pub dry_run: bool,
    /// Overwrite an existing file.
    pub force: bool,
    /// Target file; defaults to [`LedgerConfig::default_path`].
    pub path: Option<PathBuf>,
}

/// Writes the default configuration file.
///
/// Returns the path that was (or would have been) written.
///
/// # Errors
/// Returns an error if no config directory can be determined or the file
/// cannot be written.
pub fn run_init_config(options: &InitConfig) -> anyhow::Result<PathBuf> {
    let path = match &options.path {
        Some(path) => path.clone(),
        None => LedgerConfig::default_path().context("Could not determine config directory")?,
    };
    println!("Checking config at: {}", path.display());

    if path.exists() && !options.force {
        println!("[SKIP] {} already exists (use --force to overwrite).", path.display());
        return Ok(path);
    }

    let content = serde_json::to_string_pretty(&LedgerConfig::default())?;

    if options.dry_run {
        println!("[DRY RUN] Would write {}:\n{content}", path.display());
    } else {
        write_config(&path, &content)?;
        println!("[OK] Wrote default configuration.");
    }
    tracing::info!(event = "config_initialized", path = %path.display(), dry_run = options.dry_run);

    Ok(path)
}

fn write_config(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}

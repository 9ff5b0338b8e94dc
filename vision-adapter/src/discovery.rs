//! Discovery and resolution of the vision CLI executable path.

use crate::error::VisionError;
use std::path::PathBuf;
use which::which;

/// Environment variable that overrides the default binary path.
pub const VISION_BIN_ENV_VAR: &str = "LEDGERLENS_VISION_BIN";

/// Default executable name looked up on `$PATH`.
pub const VISION_BIN_NAME: &str = "ledgerlens-vision";

/// Locates the vision CLI executable.
///
/// Resolution order:
/// 1. `explicit_path` if provided and the file exists.
/// 2. The path in the `LEDGERLENS_VISION_BIN` environment variable.
/// 3. `ledgerlens-vision` resolved via `$PATH`.
/// 4. Common install locations.
///
/// # Errors
///
/// Returns `VisionError::ExecutableNotFound` when no valid executable can be
/// located.
pub fn discover_vision(explicit_path: Option<PathBuf>) -> Result<PathBuf, VisionError> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(path);
        }
        return Err(VisionError::ExecutableNotFound(format!(
            "Explicit path does not exist: {}",
            path.display()
        )));
    }

    if let Ok(path_str) = std::env::var(VISION_BIN_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            event = "vision_bin_env_ignored",
            path = %path.display(),
            "{VISION_BIN_ENV_VAR} points to a missing file"
        );
    }

    if let Ok(path) = which(VISION_BIN_NAME) {
        return Ok(path);
    }

    if let Some(location) = fallback_locations().into_iter().find(|p| p.exists()) {
        return Ok(location);
    }

    Err(VisionError::ExecutableNotFound(format!(
        "{VISION_BIN_NAME} not found. Set {VISION_BIN_ENV_VAR} or add it to PATH.\n\
         Searched: PATH, common install locations."
    )))
}

fn fallback_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".local/bin").join(VISION_BIN_NAME));
        locations.push(home.join(".cargo/bin").join(VISION_BIN_NAME));
    }
    #[cfg(unix)]
    locations.push(PathBuf::from("/usr/local/bin").join(VISION_BIN_NAME));
    locations
}

//! Shared utility functions for Keeper crates

use anyhow::anyhow;
use std::path::PathBuf;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that
/// sandboxed hosts and tests can redirect it.
pub fn get_home_dir() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))
}

/// Default directory for Keeper's own files (~/.keeper)
pub fn default_keeper_dir() -> anyhow::Result<PathBuf> {
    Ok(get_home_dir()?.join(".keeper"))
}

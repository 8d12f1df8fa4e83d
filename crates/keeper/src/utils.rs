//! Utility functions shared across CLI commands

use anyhow::{Context, Result};
use camino::Utf8Path;
use keeper_core::utils::default_keeper_dir;
use keeper_core::{HierarchicalConfigLoader, KeeperConfig};
use keeper_extensions::LocalStateHost;
use std::path::PathBuf;

/// Load configuration from defaults, keeper.yaml and KEEPER_* variables
pub fn load_config(config_path: Option<&Utf8Path>) -> Result<KeeperConfig> {
    let loader = HierarchicalConfigLoader::new()?;
    Ok(loader.load(config_path)?)
}

/// Directory holding local host state
///
/// `state-dir` from configuration, otherwise ~/.keeper.
pub fn state_dir(config: &KeeperConfig) -> Result<PathBuf> {
    match &config.state_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_keeper_dir(),
    }
}

/// Open the local state host for this configuration
pub fn open_host(config: &KeeperConfig) -> Result<LocalStateHost> {
    let dir = state_dir(config)?;
    LocalStateHost::in_dir(&dir)
        .with_context(|| format!("Failed to open host state in {}", dir.display()))
}

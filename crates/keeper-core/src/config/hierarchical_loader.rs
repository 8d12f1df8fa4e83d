//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Global config (~/.keeper/keeper.yaml, or an explicit path)
//! 3. Environment variables (KEEPER_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{ConfigOverlay, KeeperConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "keeper-defaults.yaml";
const CONFIG_FILE: &str = "keeper.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a new hierarchical config loader rooted at ~/.keeper
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the standard config directory (~/.keeper)
    fn get_config_dir() -> Result<Utf8PathBuf> {
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| Error::invalid_config("Could not determine home directory"))?;

        Ok(Utf8PathBuf::from(home).join(".keeper"))
    }

    /// Load configuration with hierarchical precedence
    ///
    /// `explicit` replaces the global config file; unlike the global file it
    /// must exist.
    pub fn load(&self, explicit: Option<&Utf8Path>) -> Result<KeeperConfig> {
        let mut config = Self::load_embedded_config::<KeeperConfig>(DEFAULTS_FILE)?;

        let overlay_path = match explicit {
            Some(path) if !path.exists() => return Err(Error::config_not_found(path.as_str())),
            Some(path) => Some(path.to_owned()),
            None => {
                let path = self.config_dir.join(CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        if let Some(path) = overlay_path {
            debug!("Applying config file: {}", path);
            let overlay = self.load_yaml_file::<ConfigOverlay>(&path)?;
            config = overlay.apply_to(config);
        }

        let config = self.apply_env_overrides(config)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the embedded defaults only
    pub fn defaults() -> Result<KeeperConfig> {
        Self::load_embedded_config(DEFAULTS_FILE)
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        let config: T = serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })?;

        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let config: T = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: KeeperConfig) -> Result<KeeperConfig> {
        if let Ok(val) = env::var("KEEPER_MANIFEST_URL") {
            config.manifest_url = Url::parse(&val).map_err(|e| {
                Error::invalid_config(format!("KEEPER_MANIFEST_URL is not a valid URL: {}", e))
            })?;
        }

        if let Ok(val) = env::var("KEEPER_ALPHA_FEATURES") {
            config.alpha_features = val.parse().map_err(|_| {
                Error::invalid_config("KEEPER_ALPHA_FEATURES must be true or false")
            })?;
        }

        if let Ok(val) = env::var("KEEPER_BUNDLED_DIR") {
            config.bundled_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("KEEPER_STATE_DIR") {
            config.state_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("KEEPER_MAINTENANCE_INTERVAL_SECS") {
            config.maintenance.interval_secs = val.parse().map_err(|_| {
                Error::invalid_config("KEEPER_MAINTENANCE_INTERVAL_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("KEEPER_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("KEEPER_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

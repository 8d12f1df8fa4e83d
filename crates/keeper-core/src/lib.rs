//! # keeper-core
//!
//! Core library for Keeper providing:
//! - Runtime configuration loading (embedded defaults, keeper.yaml, KEEPER_* env)
//! - The desired-state manifest model and its partial-success parser
//! - Preference fragment types consumed by the host install provider

pub mod config;
pub mod error;
pub mod manifest;
pub mod types;
pub mod utils;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use manifest::{parse_manifest, DroppedEntry, ParsedManifest};
pub use types::{
    DesiredStateManifest, ExtensionId, ExternalPreference, InstallDirective, InstallLocation,
    KeeperConfig, MaintenanceConfig, NetworkConfig, PreferenceFragment,
};
pub use utils::get_home_dir;

//! Test fixtures
//!
//! Builders for bundled directories, manifest documents and configuration.

#![allow(dead_code)]

use keeper_core::{ExtensionId, KeeperConfig, MaintenanceConfig, NetworkConfig};
use keeper_extensions::bundled::MANIFEST_FILE_NAME;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;
use url::Url;

use super::constants::*;

pub fn id(raw: &str) -> ExtensionId {
    ExtensionId::parse(raw).unwrap()
}

pub fn ids(raw: &[&str]) -> BTreeSet<ExtensionId> {
    raw.iter().map(|s| id(s)).collect()
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

/// Remote manifest document listing the given ids
pub fn remote_manifest_json(raw_ids: &[&str]) -> String {
    let entries: Map<String, Value> = raw_ids
        .iter()
        .map(|id| (id.to_string(), json!({ "update_url": update_url_for(id) })))
        .collect();
    Value::Object(entries).to_string()
}

/// Config with the given built-ins and no bundled directory
pub fn test_config(builtins: &[&str]) -> KeeperConfig {
    KeeperConfig {
        manifest_url: url(TEST_MANIFEST_URL),
        alpha_manifest_url: url(TEST_ALPHA_MANIFEST_URL),
        alpha_features: false,
        builtin_extension_ids: builtins.iter().map(|s| id(s)).collect(),
        bundled_dir: None,
        state_dir: None,
        maintenance: MaintenanceConfig {
            initial_delay_secs: INITIAL_DELAY.as_secs(),
            interval_secs: INTERVAL.as_secs(),
            escalation_delay_secs: ESCALATION_DELAY.as_secs(),
        },
        network: NetworkConfig::default(),
    }
}

/// Builder for a bundled package directory
pub struct BundledDirBuilder {
    temp_dir: TempDir,
    entries: Map<String, Value>,
    write_manifest: bool,
}

impl BundledDirBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            entries: Map::new(),
            write_manifest: true,
        }
    }

    /// Add an entry with a package file on disk
    pub fn with_package(mut self, id: &str) -> Self {
        let crx = format!("{}.crx", id);
        std::fs::write(self.temp_dir.path().join(&crx), b"Cr24").unwrap();
        self.entries.insert(
            id.to_string(),
            json!({ "external_crx": crx, "external_version": TEST_EXTENSION_VERSION }),
        );
        self
    }

    /// Add an entry whose package file does not exist
    pub fn with_missing_package(mut self, id: &str) -> Self {
        self.entries.insert(
            id.to_string(),
            json!({ "external_crx": format!("{}.crx", id), "external_version": TEST_EXTENSION_VERSION }),
        );
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.write_manifest = false;
        self
    }

    pub fn build(self) -> TempDir {
        if self.write_manifest {
            write_bundled_manifest(self.temp_dir.path(), &Value::Object(self.entries).to_string());
        }
        self.temp_dir
    }
}

impl Default for BundledDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Overwrite the bundled manifest with raw content
pub fn write_bundled_manifest(dir: &Path, content: &str) {
    std::fs::write(dir.join(MANIFEST_FILE_NAME), content).unwrap();
}

//! Bundled package directory
//!
//! A bundled directory ships alongside the host application:
//!
//! ```text
//! <bundled-dir>/
//!   bundled_extensions.json
//!   bflpfmnmnokmjhmgnolecpppdbdophmk.crx
//!   adlpneommgkgeanpaekgoaolcpncohkf.crx
//! ```
//!
//! `bundled_extensions.json` uses the same wire format as the remote manifest,
//! with `external_crx` naming a package file relative to the directory.

use keeper_core::{
    parse_manifest, DesiredStateManifest, ExtensionId, ExternalPreference, InstallDirective,
    PreferenceFragment,
};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the manifest file inside the bundled directory
pub const MANIFEST_FILE_NAME: &str = "bundled_extensions.json";

/// Why the bundled directory could not be used
#[derive(Error, Debug)]
pub enum BundledError {
    #[error("Bundled directory not present: {0}")]
    NotPresent(PathBuf),

    #[error("Bundled manifest not found: {0}")]
    ManifestMissing(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed bundled manifest: {0}")]
    Malformed(#[from] keeper_core::Error),

    #[error("Bundled manifest has no usable entries")]
    Empty,

    #[error("Bundled read task failed: {0}")]
    Join(String),
}

/// Usable contents of a bundled directory
#[derive(Debug, Clone)]
pub struct BundledManifest {
    /// Entries whose packages resolved
    pub manifest: DesiredStateManifest,
    /// Provider preferences with absolute package paths
    pub prefs: PreferenceFragment,
}

/// Bundled extensions source
#[derive(Debug, Clone)]
pub struct BundledSource {
    pub base_path: PathBuf,
}

impl BundledSource {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_path.join(MANIFEST_FILE_NAME)
    }

    /// Whether the directory and its manifest both exist
    pub fn is_available(&self) -> bool {
        self.base_path.is_dir() && self.manifest_path().is_file()
    }

    /// Read and resolve the bundled manifest
    ///
    /// Blocking; use [`BundledSource::load_async`] from async code.
    pub fn load(&self) -> Result<BundledManifest, BundledError> {
        if !self.base_path.is_dir() {
            return Err(BundledError::NotPresent(self.base_path.clone()));
        }

        let manifest_path = self.manifest_path();
        if !manifest_path.is_file() {
            return Err(BundledError::ManifestMissing(manifest_path));
        }

        debug!("Reading bundled manifest: {:?}", manifest_path);
        let content = std::fs::read_to_string(&manifest_path).map_err(|source| BundledError::Io {
            path: manifest_path.clone(),
            source,
        })?;

        let parsed = parse_manifest(&content)?;

        let mut kept: Vec<(ExtensionId, InstallDirective)> = Vec::new();
        let mut prefs = PreferenceFragment::new();

        for (id, directive) in parsed.manifest.iter() {
            let crx_path = match directive.external_crx.as_deref() {
                Some(crx) => match resolve_package(&self.base_path, crx) {
                    Ok(path) => Some(path),
                    Err(reason) => {
                        warn!("Dropping bundled entry {}: {}", id, reason);
                        continue;
                    }
                },
                None => None,
            };

            if let Some(pref) = ExternalPreference::from_directive(directive, crx_path) {
                prefs.insert(id.clone(), pref);
                kept.push((id.clone(), directive.clone()));
            }
        }

        if prefs.is_empty() {
            return Err(BundledError::Empty);
        }

        info!(
            "Loaded {} bundled extensions from {:?}",
            prefs.len(),
            self.base_path
        );

        Ok(BundledManifest {
            manifest: DesiredStateManifest::from_entries(kept),
            prefs,
        })
    }

    /// [`BundledSource::load`] on the blocking worker pool
    pub async fn load_async(self) -> Result<BundledManifest, BundledError> {
        tokio::task::spawn_blocking(move || self.load())
            .await
            .map_err(|e| BundledError::Join(e.to_string()))?
    }
}

/// Resolve a package file name against the bundled directory
///
/// The name must be relative, stay inside the directory, and point at an
/// existing file.
fn resolve_package(base: &Path, crx: &str) -> Result<PathBuf, String> {
    let relative = Path::new(crx);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(format!("package path {:?} escapes the bundled directory", crx));
    }

    let path = base.join(relative);
    if !path.is_file() {
        return Err(format!("package file {:?} not found", path));
    }
    Ok(path)
}

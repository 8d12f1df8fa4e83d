//! One-shot installation
//!
//! The installer tries the bundled directory first and falls back to the
//! remote manifest. It runs exactly once: `start_installation` consumes it.

use keeper_core::{DesiredStateManifest, ExtensionId, ExternalPreference, PreferenceFragment};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use crate::bundled::{BundledManifest, BundledSource};
use crate::fetch::{fetch_manifest, ManifestFetcher};

/// Outcome of the single installation attempt
#[derive(Debug, Clone, Default)]
pub struct InstallResult {
    /// Preference fragment for the install provider
    pub prefs: PreferenceFragment,
    /// Manifest the result was built from
    pub manifest: DesiredStateManifest,
    /// Ids resolved by this attempt
    pub extension_ids: BTreeSet<ExtensionId>,
    /// Bundled directory, when the bundled path succeeded
    pub bundled_path: Option<PathBuf>,
    pub from_bundled: bool,
}

impl InstallResult {
    /// Result of a failed remote attempt
    pub fn empty() -> Self {
        Self::default()
    }

    fn bundled(bundled: BundledManifest, path: PathBuf) -> Self {
        Self {
            extension_ids: bundled.prefs.keys().cloned().collect(),
            prefs: bundled.prefs,
            manifest: bundled.manifest,
            bundled_path: Some(path),
            from_bundled: true,
        }
    }

    fn remote(manifest: DesiredStateManifest) -> Self {
        let prefs: PreferenceFragment = manifest
            .iter()
            .filter_map(|(id, directive)| {
                ExternalPreference::from_directive(directive, None).map(|pref| (id.clone(), pref))
            })
            .collect();

        Self {
            extension_ids: prefs.keys().cloned().collect(),
            prefs,
            manifest,
            bundled_path: None,
            from_bundled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extension_ids.is_empty()
    }
}

/// Single-use installer
pub struct ExtensionInstaller {
    fetcher: Arc<dyn ManifestFetcher>,
    bundled: Option<BundledSource>,
}

impl ExtensionInstaller {
    pub fn new(fetcher: Arc<dyn ManifestFetcher>, bundled_dir: Option<PathBuf>) -> Self {
        Self {
            fetcher,
            bundled: bundled_dir.map(BundledSource::new),
        }
    }

    /// Run the installation attempt
    ///
    /// Never fails: every error along the way ends in an empty or partial
    /// result.
    pub async fn start_installation(self, manifest_url: &Url) -> InstallResult {
        if let Some(source) = self.bundled {
            let path = source.base_path.clone();
            match source.load_async().await {
                Ok(bundled) => {
                    info!(
                        "Installing {} extensions from bundled directory {:?}",
                        bundled.prefs.len(),
                        path
                    );
                    return InstallResult::bundled(bundled, path);
                }
                Err(e) => info!("Bundled install unavailable, using remote manifest: {}", e),
            }
        } else {
            debug!("No bundled directory configured");
        }

        match fetch_manifest(self.fetcher.as_ref(), manifest_url).await {
            Some(manifest) => {
                let result = InstallResult::remote(manifest);
                info!(
                    "Resolved {} extensions from {}",
                    result.extension_ids.len(),
                    manifest_url
                );
                result
            }
            None => InstallResult::empty(),
        }
    }
}

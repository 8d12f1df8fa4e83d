//! Install orchestration
//!
//! [`ExtensionLoader`] owns the installer and the maintainer. It runs the
//! installation once, hands the resulting preferences to the host install
//! provider, escalates to an immediate install when the remote manifest was
//! used, and then starts periodic maintenance.

use keeper_core::{DesiredStateManifest, ExtensionId, KeeperConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::ManifestFetcher;
use crate::host::{ExtensionHost, InstallProvider};
use crate::installer::ExtensionInstaller;
use crate::maintainer::{CycleReport, ExtensionMaintainer, MaintainerHandle, MaintenanceSettings};
use crate::reconcile::{trigger_immediate_installation, EscalationReport};

/// Entry point of the install-then-reconcile pipeline
pub struct ExtensionLoader {
    host: Arc<dyn ExtensionHost>,
    provider: Arc<dyn InstallProvider>,
    fetcher: Arc<dyn ManifestFetcher>,
    manifest_url: Url,
    bundled_dir: Option<PathBuf>,
    settings: MaintenanceSettings,
    escalation_delay: Duration,
    extension_ids: BTreeSet<ExtensionId>,
    bundled_crx_base_path: Option<PathBuf>,
    last_manifest: DesiredStateManifest,
    installed: bool,
    from_bundled: bool,
    escalation: Option<JoinHandle<EscalationReport>>,
    maintainer: Option<MaintainerHandle>,
}

impl ExtensionLoader {
    /// Create a loader from runtime configuration
    ///
    /// The manifest URL is chosen here from the alpha feature flag, and the
    /// tracked set starts as the built-in id list.
    pub fn new(
        config: &KeeperConfig,
        host: Arc<dyn ExtensionHost>,
        provider: Arc<dyn InstallProvider>,
        fetcher: Arc<dyn ManifestFetcher>,
    ) -> Self {
        Self {
            host,
            provider,
            fetcher,
            manifest_url: config.effective_manifest_url().clone(),
            bundled_dir: config.bundled_dir.clone(),
            settings: MaintenanceSettings::from(&config.maintenance),
            escalation_delay: config.maintenance.escalation_delay(),
            extension_ids: config.builtin_extension_ids.iter().cloned().collect(),
            bundled_crx_base_path: None,
            last_manifest: DesiredStateManifest::new(),
            installed: false,
            from_bundled: false,
            escalation: None,
            maintainer: None,
        }
    }

    /// Override the manifest URL; must be called before `start_loading`
    pub fn set_manifest_url(&mut self, url: Url) {
        if self.installed {
            warn!("Ignoring manifest URL change after installation started");
            return;
        }
        self.manifest_url = url;
    }

    /// Install once, then hand off to periodic maintenance
    pub async fn start_loading(&mut self) {
        self.install().await;
        self.start_maintenance();
    }

    /// Run the one-time installation and schedule escalation if needed
    ///
    /// Later calls do nothing.
    pub async fn install(&mut self) {
        if self.installed {
            debug!("Installation already ran");
            return;
        }
        self.installed = true;

        info!("Loading extensions from {}", self.manifest_url);

        let installer = ExtensionInstaller::new(self.fetcher.clone(), self.bundled_dir.clone());
        let result = installer.start_installation(&self.manifest_url).await;

        self.extension_ids.extend(result.extension_ids.iter().cloned());
        self.bundled_crx_base_path = result.bundled_path.clone();
        self.from_bundled = result.from_bundled;
        self.last_manifest = result.manifest;

        info!(
            "Installation resolved {} extensions ({}), tracking {}",
            result.extension_ids.len(),
            if result.from_bundled { "bundled" } else { "remote" },
            self.extension_ids.len()
        );

        if let Err(e) = self
            .provider
            .load_finished(result.prefs, result.bundled_path.as_deref())
        {
            warn!("Install provider rejected preferences: {}", e);
        }

        if !result.from_bundled {
            self.schedule_escalation();
        }
    }

    fn schedule_escalation(&mut self) {
        let host = self.host.clone();
        let ids = self.extension_ids.clone();
        let manifest = self.last_manifest.clone();
        let delay = self.escalation_delay;

        debug!("Scheduling immediate installation in {:?}", delay);
        self.escalation = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger_immediate_installation(host.as_ref(), &ids, &manifest)
        }));
    }

    /// Start the maintenance loop with the current state
    pub fn start_maintenance(&mut self) {
        if self.maintainer.is_some() {
            debug!("Maintenance already running");
            return;
        }

        let maintainer = ExtensionMaintainer::new(
            self.host.clone(),
            self.fetcher.clone(),
            self.settings,
        );
        self.maintainer = Some(maintainer.start(
            self.manifest_url.clone(),
            self.extension_ids.clone(),
            std::mem::take(&mut self.last_manifest),
        ));
    }

    /// Run a single maintenance cycle in place of the loop
    pub async fn run_maintenance_once(&self) -> CycleReport {
        let mut maintainer = ExtensionMaintainer::new(
            self.host.clone(),
            self.fetcher.clone(),
            self.settings,
        );
        maintainer.prepare(
            self.manifest_url.clone(),
            self.extension_ids.clone(),
            self.last_manifest.clone(),
        );
        maintainer.run_cycle().await
    }

    /// Add ids to the tracked set and forward the full set to maintenance
    pub fn track_extension_ids(&mut self, ids: impl IntoIterator<Item = ExtensionId>) {
        self.extension_ids.extend(ids);
        if let Some(maintainer) = &self.maintainer {
            maintainer.update_extension_ids(self.extension_ids.clone());
        }
    }

    /// Wait for a scheduled escalation to finish
    ///
    /// Returns `None` if none was scheduled or it was cancelled.
    pub async fn wait_for_escalation(&mut self) -> Option<EscalationReport> {
        let handle = self.escalation.take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                debug!("Escalation did not complete: {}", e);
                None
            }
        }
    }

    pub fn extension_ids(&self) -> &BTreeSet<ExtensionId> {
        &self.extension_ids
    }

    pub fn bundled_crx_base_path(&self) -> Option<&Path> {
        self.bundled_crx_base_path.as_deref()
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }

    pub fn from_bundled(&self) -> bool {
        self.from_bundled
    }

    pub fn escalation_scheduled(&self) -> bool {
        self.escalation.is_some()
    }

    pub fn is_maintaining(&self) -> bool {
        self.maintainer.as_ref().is_some_and(|m| !m.is_finished())
    }
}

impl Drop for ExtensionLoader {
    fn drop(&mut self) {
        if let Some(escalation) = self.escalation.take() {
            escalation.abort();
        }
    }
}

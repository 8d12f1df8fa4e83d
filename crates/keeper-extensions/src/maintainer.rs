//! Periodic reconciliation
//!
//! The maintainer runs as a single task that owns its manifest and tracked
//! id set. Each cycle re-fetches the manifest and, if the fetch succeeded,
//! runs the corrective tasks in [`MaintenanceTask::ORDER`]. The next cycle
//! is scheduled one interval after the previous one finished.
//!
//! The only way to talk to a running maintainer is [`MaintainerHandle`].
//! Dropping the handle stops the loop.

use keeper_core::{DesiredStateManifest, ExtensionId, MaintenanceConfig};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{fetch_manifest, ManifestFetcher};
use crate::health::HealthReport;
use crate::host::{ExtensionHost, HostError, UpdateCheck};
use crate::reconcile::enqueue_missing;

/// Timing of the maintenance loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceSettings {
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl From<&MaintenanceConfig> for MaintenanceSettings {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            interval: config.interval(),
        }
    }
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self::from(&MaintenanceConfig::default())
    }
}

/// One corrective action of a maintenance cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTask {
    UninstallDeprecated,
    ReinstallMissing,
    ReenableDisabled,
    ForceUpdateCheck,
    LogHealth,
}

impl MaintenanceTask {
    /// Execution order within a cycle
    pub const ORDER: [MaintenanceTask; 5] = [
        MaintenanceTask::UninstallDeprecated,
        MaintenanceTask::ReinstallMissing,
        MaintenanceTask::ReenableDisabled,
        MaintenanceTask::ForceUpdateCheck,
        MaintenanceTask::LogHealth,
    ];
}

impl fmt::Display for MaintenanceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceTask::UninstallDeprecated => write!(f, "uninstall-deprecated"),
            MaintenanceTask::ReinstallMissing => write!(f, "reinstall-missing"),
            MaintenanceTask::ReenableDisabled => write!(f, "reenable-disabled"),
            MaintenanceTask::ForceUpdateCheck => write!(f, "force-update-check"),
            MaintenanceTask::LogHealth => write!(f, "log-health"),
        }
    }
}

/// Result of one corrective action
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: MaintenanceTask,
    /// Extensions the action changed or requested
    pub affected: usize,
    pub errors: Vec<HostError>,
}

impl TaskOutcome {
    fn new(task: MaintenanceTask) -> Self {
        Self {
            task,
            affected: 0,
            errors: Vec::new(),
        }
    }

    fn failed(task: MaintenanceTask, error: HostError) -> Self {
        Self {
            task,
            affected: 0,
            errors: vec![error],
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything a single cycle did
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle number
    pub cycle: u64,
    /// False when the fetch failed and no action ran
    pub manifest_refreshed: bool,
    pub outcomes: Vec<TaskOutcome>,
    pub health: Option<HealthReport>,
}

impl CycleReport {
    fn skipped(cycle: u64) -> Self {
        Self {
            cycle,
            manifest_refreshed: false,
            outcomes: Vec::new(),
            health: None,
        }
    }

    pub fn outcome(&self, task: MaintenanceTask) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.task == task)
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.errors.len()).sum()
    }

    /// Tag attached to this cycle's health log
    pub fn context(&self) -> String {
        cycle_context(self.cycle)
    }
}

fn cycle_context(cycle: u64) -> String {
    format!("maintenance-cycle-{}", cycle)
}

enum MaintainerCommand {
    UpdateExtensionIds(BTreeSet<ExtensionId>),
}

/// Reconciles host state against the desired-state manifest
pub struct ExtensionMaintainer {
    host: Arc<dyn ExtensionHost>,
    fetcher: Arc<dyn ManifestFetcher>,
    settings: MaintenanceSettings,
    manifest_url: Option<Url>,
    extension_ids: BTreeSet<ExtensionId>,
    last_manifest: DesiredStateManifest,
    cycles: u64,
}

impl ExtensionMaintainer {
    pub fn new(
        host: Arc<dyn ExtensionHost>,
        fetcher: Arc<dyn ManifestFetcher>,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            host,
            fetcher,
            settings,
            manifest_url: None,
            extension_ids: BTreeSet::new(),
            last_manifest: DesiredStateManifest::new(),
            cycles: 0,
        }
    }

    /// Set the manifest source, tracked ids and starting manifest
    pub fn prepare(
        &mut self,
        manifest_url: Url,
        extension_ids: BTreeSet<ExtensionId>,
        initial_manifest: DesiredStateManifest,
    ) {
        self.manifest_url = Some(manifest_url);
        self.extension_ids = extension_ids;
        self.last_manifest = initial_manifest;
    }

    /// Start the maintenance loop
    ///
    /// The first cycle runs after the configured initial delay.
    pub fn start(
        mut self,
        manifest_url: Url,
        extension_ids: BTreeSet<ExtensionId>,
        initial_manifest: DesiredStateManifest,
    ) -> MaintainerHandle {
        self.prepare(manifest_url, extension_ids, initial_manifest);
        info!(
            "Starting extension maintenance for {} extensions (first cycle in {:?})",
            self.extension_ids.len(),
            self.settings.initial_delay
        );

        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        MaintainerHandle { commands, task }
    }

    /// Replace the tracked id set for subsequent cycles
    pub fn update_extension_ids(&mut self, ids: BTreeSet<ExtensionId>) {
        debug!("Tracking {} extensions", ids.len());
        self.extension_ids = ids;
    }

    pub fn extension_ids(&self) -> &BTreeSet<ExtensionId> {
        &self.extension_ids
    }

    pub fn last_manifest(&self) -> &DesiredStateManifest {
        &self.last_manifest
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<MaintainerCommand>) {
        let mut next_cycle = Instant::now() + self.settings.initial_delay;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_cycle) => {
                    self.run_cycle().await;
                    next_cycle = Instant::now() + self.settings.interval;
                }
                command = commands.recv() => match command {
                    Some(MaintainerCommand::UpdateExtensionIds(ids)) => {
                        self.update_extension_ids(ids);
                    }
                    None => {
                        debug!("Maintainer handle dropped, stopping");
                        return;
                    }
                },
            }
        }
    }

    /// Run a single maintenance cycle
    ///
    /// A failed fetch leaves the manifest and tracked set untouched and runs
    /// no corrective action.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;

        let Some(url) = self.manifest_url.clone() else {
            warn!("No manifest URL set, skipping maintenance cycle {}", cycle);
            return CycleReport::skipped(cycle);
        };

        match fetch_manifest(self.fetcher.as_ref(), &url).await {
            Some(manifest) => self.last_manifest = manifest,
            None => {
                warn!("Skipping maintenance cycle {}: manifest unavailable", cycle);
                return CycleReport::skipped(cycle);
            }
        }

        debug!(
            "Maintenance cycle {}: {} tracked, {} in manifest",
            cycle,
            self.extension_ids.len(),
            self.last_manifest.len()
        );

        let mut health = None;
        let outcomes: Vec<TaskOutcome> = MaintenanceTask::ORDER
            .iter()
            .map(|task| match task {
                MaintenanceTask::UninstallDeprecated => self.uninstall_deprecated(),
                MaintenanceTask::ReinstallMissing => self.reinstall_missing(),
                MaintenanceTask::ReenableDisabled => self.reenable_disabled(),
                MaintenanceTask::ForceUpdateCheck => self.force_update_check(),
                MaintenanceTask::LogHealth => {
                    let (outcome, report) = self.log_health(cycle);
                    health = report;
                    outcome
                }
            })
            .collect();

        for outcome in outcomes.iter().filter(|o| !o.is_success()) {
            warn!(
                "Maintenance task {} had {} errors",
                outcome.task,
                outcome.errors.len()
            );
        }

        CycleReport {
            cycle,
            manifest_refreshed: true,
            outcomes,
            health,
        }
    }

    fn uninstall_deprecated(&self) -> TaskOutcome {
        let task = MaintenanceTask::UninstallDeprecated;
        let installed = match self.host.installed_extensions() {
            Ok(installed) => installed,
            Err(e) => return TaskOutcome::failed(task, e),
        };

        let mut outcome = TaskOutcome::new(task);
        for ext in installed
            .iter()
            .filter(|ext| ext.is_managed() && !self.extension_ids.contains(&ext.id))
        {
            match self.host.uninstall(&ext.id) {
                Ok(()) => {
                    info!("Uninstalled deprecated extension {}", ext.id);
                    outcome.affected += 1;
                }
                Err(e) => {
                    warn!("Failed to uninstall {}: {}", ext.id, e);
                    outcome.errors.push(e);
                }
            }
        }
        outcome
    }

    fn reinstall_missing(&self) -> TaskOutcome {
        let task = MaintenanceTask::ReinstallMissing;
        match enqueue_missing(self.host.as_ref(), &self.extension_ids, &self.last_manifest) {
            Ok(summary) => TaskOutcome {
                task,
                affected: summary.enqueued.len(),
                errors: summary.failed.into_iter().map(|(_, e)| e).collect(),
            },
            Err(e) => TaskOutcome::failed(task, e),
        }
    }

    fn reenable_disabled(&self) -> TaskOutcome {
        let task = MaintenanceTask::ReenableDisabled;
        let installed = match self.host.installed_extensions() {
            Ok(installed) => installed,
            Err(e) => return TaskOutcome::failed(task, e),
        };

        let mut outcome = TaskOutcome::new(task);
        for ext in installed
            .iter()
            .filter(|ext| self.extension_ids.contains(&ext.id) && !ext.is_enabled())
        {
            match self.host.enable(&ext.id) {
                Ok(()) => {
                    info!("Re-enabled extension {}", ext.id);
                    outcome.affected += 1;
                }
                Err(e) => {
                    warn!("Failed to re-enable {}: {}", ext.id, e);
                    outcome.errors.push(e);
                }
            }
        }
        outcome
    }

    fn force_update_check(&self) -> TaskOutcome {
        let task = MaintenanceTask::ForceUpdateCheck;
        match self
            .host
            .check_updates(UpdateCheck::background(self.extension_ids.clone()))
        {
            Ok(()) => TaskOutcome {
                task,
                affected: self.extension_ids.len(),
                errors: Vec::new(),
            },
            Err(e) => TaskOutcome::failed(task, e),
        }
    }

    fn log_health(&self, cycle: u64) -> (TaskOutcome, Option<HealthReport>) {
        let task = MaintenanceTask::LogHealth;
        match HealthReport::collect(self.host.as_ref(), &self.extension_ids) {
            Ok(report) => {
                report.log(&cycle_context(cycle));
                let outcome = TaskOutcome {
                    task,
                    affected: report.tracked,
                    errors: Vec::new(),
                };
                (outcome, Some(report))
            }
            Err(e) => (TaskOutcome::failed(task, e), None),
        }
    }
}

/// Owner's handle to a running maintainer
///
/// Dropping it aborts the maintenance task.
pub struct MaintainerHandle {
    commands: mpsc::UnboundedSender<MaintainerCommand>,
    task: JoinHandle<()>,
}

impl MaintainerHandle {
    /// Replace the tracked id set; takes effect from the next cycle
    pub fn update_extension_ids(&self, ids: BTreeSet<ExtensionId>) {
        if self
            .commands
            .send(MaintainerCommand::UpdateExtensionIds(ids))
            .is_err()
        {
            debug!("Maintainer already stopped, dropping id update");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for MaintainerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

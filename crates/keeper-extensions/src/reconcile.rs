//! Corrective actions shared by the loader escalation and the maintainer

use keeper_core::{DesiredStateManifest, ExtensionId};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::host::{ExtensionHost, HostError, PendingInstall, UpdateCheck};

/// What an enqueue pass did for each missing id
#[derive(Debug, Default)]
pub struct EnqueueSummary {
    /// Ids added to the pending-install queue
    pub enqueued: Vec<ExtensionId>,
    /// Missing ids with no manifest entry or update URL
    pub skipped: Vec<ExtensionId>,
    /// Ids the host refused to queue
    pub failed: Vec<(ExtensionId, HostError)>,
}

/// Outcome of [`trigger_immediate_installation`]
#[derive(Debug, Default)]
pub struct EscalationReport {
    pub enqueue: EnqueueSummary,
    /// Whether the immediate update check was issued
    pub update_check_sent: bool,
    pub errors: Vec<HostError>,
}

impl EscalationReport {
    /// Nothing was attempted
    pub fn is_noop(&self) -> bool {
        !self.update_check_sent
            && self.enqueue.enqueued.is_empty()
            && self.enqueue.skipped.is_empty()
            && self.enqueue.failed.is_empty()
            && self.errors.is_empty()
    }
}

/// Queue every tracked id the host has not installed
///
/// Uses the manifest's update URL for each id; ids without one are skipped.
/// A refused enqueue does not stop the rest.
pub(crate) fn enqueue_missing(
    host: &dyn ExtensionHost,
    ids: &BTreeSet<ExtensionId>,
    manifest: &DesiredStateManifest,
) -> Result<EnqueueSummary, HostError> {
    let installed: BTreeSet<ExtensionId> = host
        .installed_extensions()?
        .into_iter()
        .map(|ext| ext.id)
        .collect();

    let mut summary = EnqueueSummary::default();
    for id in ids.difference(&installed) {
        let Some(url) = manifest.update_url(id.as_str()) else {
            debug!("No update URL for {}, skipping", id);
            summary.skipped.push(id.clone());
            continue;
        };

        match host.enqueue_install(PendingInstall::external_component(id.clone(), url.clone())) {
            Ok(()) => {
                info!("Added {} to pending installs", id);
                summary.enqueued.push(id.clone());
            }
            Err(e) => {
                warn!("Failed to queue {}: {}", id, e);
                summary.failed.push((id.clone(), e));
            }
        }
    }

    Ok(summary)
}

/// Force installation of tracked extensions right away
///
/// Queues every tracked id that is not installed, then asks the host for an
/// immediate foreground update check of the tracked set. Does nothing when
/// either the id set or the manifest is empty.
pub fn trigger_immediate_installation(
    host: &dyn ExtensionHost,
    ids: &BTreeSet<ExtensionId>,
    manifest: &DesiredStateManifest,
) -> EscalationReport {
    let mut report = EscalationReport::default();
    if ids.is_empty() || manifest.is_empty() {
        debug!("Nothing to escalate");
        return report;
    }

    info!("Triggering immediate installation");

    match enqueue_missing(host, ids, manifest) {
        Ok(summary) => report.enqueue = summary,
        Err(e) => {
            warn!("Could not read installed extensions: {}", e);
            report.errors.push(e);
        }
    }

    match host.check_updates(UpdateCheck::immediate(ids.clone())) {
        Ok(()) => report.update_check_sent = true,
        Err(e) => {
            warn!("Immediate update check failed: {}", e);
            report.errors.push(e);
        }
    }

    report
}

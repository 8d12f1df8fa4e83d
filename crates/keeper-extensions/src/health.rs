//! Health summary of tracked extensions

use keeper_core::ExtensionId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::host::{ExtensionHost, HostError, InstalledExtension};

/// Counts of tracked extensions by install state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub tracked: usize,
    pub installed: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub missing: usize,
    pub missing_ids: Vec<ExtensionId>,
    pub disabled_ids: Vec<ExtensionId>,
}

impl HealthReport {
    /// Compare the tracked set against what the host reports
    pub fn collect(
        host: &dyn ExtensionHost,
        tracked: &BTreeSet<ExtensionId>,
    ) -> Result<Self, HostError> {
        let installed = host.installed_extensions()?;
        Ok(Self::from_installed(&installed, tracked))
    }

    pub fn from_installed(
        installed: &[InstalledExtension],
        tracked: &BTreeSet<ExtensionId>,
    ) -> Self {
        let by_id: BTreeMap<&ExtensionId, &InstalledExtension> =
            installed.iter().map(|ext| (&ext.id, ext)).collect();

        let mut report = Self {
            tracked: tracked.len(),
            ..Self::default()
        };

        for id in tracked {
            match by_id.get(id) {
                Some(ext) => {
                    report.installed += 1;
                    if ext.is_enabled() {
                        report.enabled += 1;
                    } else {
                        report.disabled += 1;
                        report.disabled_ids.push(id.clone());
                    }
                }
                None => {
                    report.missing += 1;
                    report.missing_ids.push(id.clone());
                }
            }
        }

        report
    }

    pub fn is_healthy(&self) -> bool {
        self.missing == 0 && self.disabled == 0
    }

    /// Emit the report as one structured log line
    pub fn log(&self, context: &str) {
        info!(
            context = context,
            tracked = self.tracked,
            installed = self.installed,
            enabled = self.enabled,
            disabled = self.disabled,
            missing = self.missing,
            "Extension health"
        );
    }
}

//! Boundary to the host application's extension runtime
//!
//! The installed-extension registry, the pending-install queue and the update
//! scheduler belong to the host. Keeper only talks to them through
//! [`ExtensionHost`], and hands install preferences to [`InstallProvider`].
//! Both are treated as eventually consistent: a call returning `Ok` does not
//! mean its effect is already visible.

mod local;

pub use local::{HostState, InstalledRecord, LocalStateHost, PendingRecord};

use keeper_core::{ExtensionId, InstallLocation, PreferenceFragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors reported by the host runtime
#[derive(Error, Debug)]
pub enum HostError {
    /// The host service is not reachable right now
    #[error("Extension host unavailable: {0}")]
    Unavailable(String),

    /// The host does not know the extension
    #[error("Unknown extension: {0}")]
    UnknownExtension(ExtensionId),

    /// The host refused the operation
    #[error("Host rejected {operation} for {id}: {reason}")]
    Rejected {
        operation: &'static str,
        id: ExtensionId,
        reason: String,
    },

    /// Host state could not be read or written
    #[error("Host state IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Host state file is corrupt
    #[error("Host state parse error: {0}")]
    StateParse(#[from] serde_yaml_ng::Error),
}

/// Whether an installed extension is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionState {
    Enabled,
    Disabled,
}

/// One extension as reported by the host registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledExtension {
    pub id: ExtensionId,
    pub version: Option<String>,
    pub location: InstallLocation,
    pub state: ExtensionState,
}

impl InstalledExtension {
    pub fn is_enabled(&self) -> bool {
        self.state == ExtensionState::Enabled
    }

    /// Installed by Keeper, judged by the provenance marker
    pub fn is_managed(&self) -> bool {
        self.location.is_managed()
    }
}

/// Request to add an extension to the host's pending-install queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInstall {
    pub id: ExtensionId,
    pub update_url: Url,
    pub location: InstallLocation,
    pub install_by_default: bool,
}

impl PendingInstall {
    /// Pending install tagged with Keeper's provenance marker
    pub fn external_component(id: ExtensionId, update_url: Url) -> Self {
        Self {
            id,
            update_url,
            location: InstallLocation::ExternalComponent,
            install_by_default: true,
        }
    }
}

/// Download priority for an update check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPriority {
    Background,
    Foreground,
}

/// Request for the host to check the given extensions for updates now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub ids: BTreeSet<ExtensionId>,
    pub install_immediately: bool,
    pub priority: FetchPriority,
}

impl UpdateCheck {
    /// Foreground check that installs as soon as packages arrive
    pub fn immediate(ids: BTreeSet<ExtensionId>) -> Self {
        Self {
            ids,
            install_immediately: true,
            priority: FetchPriority::Foreground,
        }
    }

    /// Routine background check
    pub fn background(ids: BTreeSet<ExtensionId>) -> Self {
        Self {
            ids,
            install_immediately: false,
            priority: FetchPriority::Background,
        }
    }
}

/// The host's extension registry, pending-install queue and updater
pub trait ExtensionHost: Send + Sync {
    /// Every extension the host has installed
    fn installed_extensions(&self) -> Result<Vec<InstalledExtension>, HostError>;

    /// Look up a single installed extension
    fn installed_extension(&self, id: &ExtensionId) -> Result<Option<InstalledExtension>, HostError> {
        Ok(self
            .installed_extensions()?
            .into_iter()
            .find(|ext| &ext.id == id))
    }

    /// Queue an extension for installation from its update URL
    fn enqueue_install(&self, request: PendingInstall) -> Result<(), HostError>;

    /// Check the given extensions for updates
    fn check_updates(&self, check: UpdateCheck) -> Result<(), HostError>;

    fn uninstall(&self, id: &ExtensionId) -> Result<(), HostError>;

    fn enable(&self, id: &ExtensionId) -> Result<(), HostError>;
}

/// Consumer of the install preference document
///
/// Receiving the fragment is what makes an installation effective.
pub trait InstallProvider: Send + Sync {
    fn load_finished(
        &self,
        prefs: PreferenceFragment,
        bundled_base: Option<&Path>,
    ) -> Result<(), HostError>;
}

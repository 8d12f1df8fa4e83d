//! File-backed host used by the CLI
//!
//! Persists installed extensions and the pending-install queue at
//! `~/.keeper/state.yaml`:
//!
//! ```yaml
//! schema_version: "1.0"
//! last_updated: "2026-01-21T10:00:00Z"
//! extensions:
//!   bflpfmnmnokmjhmgnolecpppdbdophmk:
//!     version: "1.4.0"
//!     location: external_component
//!     state: enabled
//!     installed_at: "2026-01-20T15:30:00Z"
//!     source: "bundled:/opt/keeper/bundled/bflpfmnmnokmjhmgnolecpppdbdophmk.crx"
//! pending: {}
//! ```
//!
//! Pending installs complete when an update check names them, which mirrors a
//! host that downloads queued extensions during its next update pass.

use chrono::{DateTime, Utc};
use keeper_core::{ExtensionId, InstallLocation, PreferenceFragment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{
    ExtensionHost, ExtensionState, HostError, InstallProvider, InstalledExtension, PendingInstall,
    UpdateCheck,
};

const STATE_FILE: &str = "state.yaml";
const SCHEMA_VERSION: &str = "1.0";

/// Persisted host state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    pub schema_version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub extensions: BTreeMap<ExtensionId, InstalledRecord>,
    #[serde(default)]
    pub pending: BTreeMap<ExtensionId, PendingRecord>,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            last_updated: Utc::now(),
            extensions: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub location: InstallLocation,
    pub state: ExtensionState,
    pub installed_at: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub location: InstallLocation,
    pub queued_at: DateTime<Utc>,
}

/// Host backed by a YAML state file
pub struct LocalStateHost {
    state_path: PathBuf,
    state: Mutex<HostState>,
}

impl LocalStateHost {
    /// Open the state file, creating it if it doesn't exist
    pub fn new(state_path: PathBuf) -> Result<Self, HostError> {
        debug!("Loading host state from: {:?}", state_path);

        let state = if state_path.exists() {
            let content = std::fs::read_to_string(&state_path)?;
            serde_yaml_ng::from_str(&content)?
        } else {
            info!("Creating new host state at: {:?}", state_path);
            let state = HostState::default();
            Self::save_state(&state_path, &state)?;
            state
        };

        Ok(Self {
            state_path,
            state: Mutex::new(state),
        })
    }

    /// Open `state.yaml` inside `state_dir`
    pub fn in_dir(state_dir: &Path) -> Result<Self, HostError> {
        Self::new(state_dir.join(STATE_FILE))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Result<HostState, HostError> {
        Ok(self.lock()?.clone())
    }

    /// Ids waiting in the pending-install queue
    pub fn pending_ids(&self) -> Result<Vec<ExtensionId>, HostError> {
        Ok(self.lock()?.pending.keys().cloned().collect())
    }

    /// Disable an installed extension
    pub fn disable(&self, id: &ExtensionId) -> Result<(), HostError> {
        self.mutate(|state| {
            let record = state
                .extensions
                .get_mut(id)
                .ok_or_else(|| HostError::UnknownExtension(id.clone()))?;
            record.state = ExtensionState::Disabled;
            Ok(())
        })
    }

    /// Record an installed extension directly
    pub fn insert_installed(
        &self,
        id: ExtensionId,
        version: Option<String>,
        location: InstallLocation,
        source: impl Into<String>,
    ) -> Result<(), HostError> {
        let source = source.into();
        self.mutate(move |state| {
            state.pending.remove(&id);
            state.extensions.insert(
                id,
                InstalledRecord {
                    version,
                    location,
                    state: ExtensionState::Enabled,
                    installed_at: Utc::now(),
                    source,
                },
            );
            Ok(())
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostState>, HostError> {
        self.state
            .lock()
            .map_err(|_| HostError::Unavailable("host state lock poisoned".to_string()))
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut HostState) -> Result<R, HostError>,
    ) -> Result<R, HostError> {
        let mut state = self.lock()?;

        // Memory only moves forward once the file has been written
        let mut next = state.clone();
        let result = f(&mut next)?;
        next.last_updated = Utc::now();
        Self::save_state(&self.state_path, &next)?;
        *state = next;
        Ok(result)
    }

    fn save_state(path: &Path, state: &HostState) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml_ng::to_string(state)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ExtensionHost for LocalStateHost {
    fn installed_extensions(&self) -> Result<Vec<InstalledExtension>, HostError> {
        let state = self.lock()?;
        Ok(state
            .extensions
            .iter()
            .map(|(id, record)| InstalledExtension {
                id: id.clone(),
                version: record.version.clone(),
                location: record.location,
                state: record.state,
            })
            .collect())
    }

    fn enqueue_install(&self, request: PendingInstall) -> Result<(), HostError> {
        self.mutate(|state| {
            if state.extensions.contains_key(&request.id) {
                debug!("{} already installed, not queueing", request.id);
                return Ok(());
            }
            state.pending.insert(
                request.id,
                PendingRecord {
                    source: request.update_url.to_string(),
                    version: None,
                    location: request.location,
                    queued_at: Utc::now(),
                },
            );
            Ok(())
        })
    }

    fn check_updates(&self, check: UpdateCheck) -> Result<(), HostError> {
        self.mutate(|state| {
            for id in &check.ids {
                if let Some(pending) = state.pending.remove(id) {
                    info!("Installed {} from {}", id, pending.source);
                    state.extensions.insert(
                        id.clone(),
                        InstalledRecord {
                            version: pending.version,
                            location: pending.location,
                            state: ExtensionState::Enabled,
                            installed_at: Utc::now(),
                            source: pending.source,
                        },
                    );
                }
            }
            Ok(())
        })
    }

    fn uninstall(&self, id: &ExtensionId) -> Result<(), HostError> {
        self.mutate(|state| {
            state.pending.remove(id);
            state
                .extensions
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| HostError::UnknownExtension(id.clone()))
        })
    }

    fn enable(&self, id: &ExtensionId) -> Result<(), HostError> {
        self.mutate(|state| {
            let record = state
                .extensions
                .get_mut(id)
                .ok_or_else(|| HostError::UnknownExtension(id.clone()))?;
            record.state = ExtensionState::Enabled;
            Ok(())
        })
    }
}

impl InstallProvider for LocalStateHost {
    fn load_finished(
        &self,
        prefs: PreferenceFragment,
        bundled_base: Option<&Path>,
    ) -> Result<(), HostError> {
        if let Some(base) = bundled_base {
            debug!("Bundled packages resolved against {:?}", base);
        }

        self.mutate(|state| {
            for (id, pref) in prefs {
                if state.extensions.contains_key(&id) {
                    continue;
                }

                if let Some(crx) = pref.external_crx.filter(|p| p.is_file()) {
                    state.extensions.insert(
                        id,
                        InstalledRecord {
                            version: pref.external_version,
                            location: pref.location,
                            state: ExtensionState::Enabled,
                            installed_at: Utc::now(),
                            source: format!("bundled:{}", crx.display()),
                        },
                    );
                } else if let Some(url) = pref.external_update_url {
                    state.pending.insert(
                        id,
                        PendingRecord {
                            source: url.to_string(),
                            version: None,
                            location: pref.location,
                            queued_at: Utc::now(),
                        },
                    );
                }
            }
            Ok(())
        })
    }
}

//! Mock implementations for testing
//!
//! Recording stand-ins for the host runtime, the install provider and the
//! manifest fetcher. Each records its calls so tests can assert on exactly
//! what the pipeline asked for.

#![allow(dead_code)]

use async_trait::async_trait;
use keeper_core::{ExtensionId, InstallLocation, PreferenceFragment};
use keeper_extensions::{
    ExtensionHost, ExtensionState, FetchError, HostError, InstallProvider, InstalledExtension,
    ManifestFetcher, PendingInstall, UpdateCheck,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// A call made against [`MockHost`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    Enqueue(PendingInstall),
    CheckUpdates(UpdateCheck),
    Uninstall(ExtensionId),
    Enable(ExtensionId),
}

#[derive(Default)]
struct MockHostState {
    installed: BTreeMap<ExtensionId, InstalledExtension>,
    calls: Vec<HostCall>,
    failing: BTreeSet<(&'static str, ExtensionId)>,
    fail_listing: bool,
    fail_update_checks: bool,
}

/// In-memory host registry that records every mutating call
#[derive(Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<MockHostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension to the registry without recording a call
    pub fn install(&self, id: &ExtensionId, location: InstallLocation, state: ExtensionState) {
        self.state.lock().unwrap().installed.insert(
            id.clone(),
            InstalledExtension {
                id: id.clone(),
                version: Some("1.0.0".to_string()),
                location,
                state,
            },
        );
    }

    /// Add an enabled extension carrying the provenance marker
    pub fn install_managed(&self, id: &ExtensionId) {
        self.install(id, InstallLocation::ExternalComponent, ExtensionState::Enabled);
    }

    /// Make `operation` fail for `id`
    ///
    /// Operations are "enqueue", "uninstall" and "enable".
    pub fn fail_on(&self, operation: &'static str, id: &ExtensionId) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert((operation, id.clone()));
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn fail_update_checks(&self) {
        self.state.lock().unwrap().fail_update_checks = true;
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn enqueued_ids(&self) -> Vec<ExtensionId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Enqueue(request) => Some(request.id),
                _ => None,
            })
            .collect()
    }

    pub fn update_checks(&self) -> Vec<UpdateCheck> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::CheckUpdates(check) => Some(check),
                _ => None,
            })
            .collect()
    }

    pub fn installed_ids(&self) -> BTreeSet<ExtensionId> {
        self.state.lock().unwrap().installed.keys().cloned().collect()
    }

    fn record(
        &self,
        call: HostCall,
        operation: &'static str,
        id: Option<&ExtensionId>,
    ) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(id) = id {
            if state.failing.contains(&(operation, id.clone())) {
                return Err(HostError::Rejected {
                    operation,
                    id: id.clone(),
                    reason: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl ExtensionHost for MockHost {
    fn installed_extensions(&self) -> Result<Vec<InstalledExtension>, HostError> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            return Err(HostError::Unavailable("injected failure".to_string()));
        }
        Ok(state.installed.values().cloned().collect())
    }

    fn enqueue_install(&self, request: PendingInstall) -> Result<(), HostError> {
        let id = request.id.clone();
        self.record(HostCall::Enqueue(request), "enqueue", Some(&id))
    }

    fn check_updates(&self, check: UpdateCheck) -> Result<(), HostError> {
        self.record(HostCall::CheckUpdates(check), "check_updates", None)?;
        if self.state.lock().unwrap().fail_update_checks {
            return Err(HostError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn uninstall(&self, id: &ExtensionId) -> Result<(), HostError> {
        self.record(HostCall::Uninstall(id.clone()), "uninstall", Some(id))?;
        self.state.lock().unwrap().installed.remove(id);
        Ok(())
    }

    fn enable(&self, id: &ExtensionId) -> Result<(), HostError> {
        self.record(HostCall::Enable(id.clone()), "enable", Some(id))?;
        if let Some(ext) = self.state.lock().unwrap().installed.get_mut(id) {
            ext.state = ExtensionState::Enabled;
        }
        Ok(())
    }
}

/// Install provider that records every hand-off
#[derive(Clone, Default)]
pub struct MockProvider {
    received: Arc<Mutex<Vec<(PreferenceFragment, Option<PathBuf>)>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> Vec<(PreferenceFragment, Option<PathBuf>)> {
        self.received.lock().unwrap().clone()
    }
}

impl InstallProvider for MockProvider {
    fn load_finished(
        &self,
        prefs: PreferenceFragment,
        bundled_base: Option<&Path>,
    ) -> Result<(), HostError> {
        self.received
            .lock()
            .unwrap()
            .push((prefs, bundled_base.map(Path::to_path_buf)));
        Ok(())
    }
}

/// Fetcher that replays scripted responses
///
/// Scripted responses are consumed in order; once exhausted the fallback
/// response is returned. `None` stands for a failed fetch.
#[derive(Clone)]
pub struct ScriptedFetcher {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    fallback: Option<String>,
    requests: Arc<Mutex<Vec<Url>>>,
}

impl ScriptedFetcher {
    /// Always return `body`
    pub fn always(body: impl Into<String>) -> Self {
        Self {
            script: Arc::default(),
            fallback: Some(body.into()),
            requests: Arc::default(),
        }
    }

    /// Always fail
    pub fn failing() -> Self {
        Self {
            script: Arc::default(),
            fallback: None,
            requests: Arc::default(),
        }
    }

    /// Queue a response ahead of the fallback
    pub fn then(self, response: Option<&str>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(response.map(str::to_string));
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.clone());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    }
}

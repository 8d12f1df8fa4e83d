//! Extension install and reconciliation for Keeper
//!
//! This crate handles:
//! - One-time installation from a bundled package directory or a remote manifest
//! - Post-install escalation when the remote path was taken
//! - Periodic reconciliation of the host's installed state against the manifest
//! - Health reporting
//!
//! The host application's extension runtime is reached only through the
//! [`ExtensionHost`] and [`InstallProvider`] traits.

pub mod bundled;
pub mod fetch;
pub mod health;
pub mod host;
pub mod installer;
pub mod loader;
pub mod maintainer;
mod reconcile;

pub use bundled::{BundledError, BundledManifest, BundledSource};
pub use fetch::{fetch_manifest, FetchError, HttpManifestFetcher, ManifestFetcher};
pub use health::HealthReport;
pub use host::{
    ExtensionHost, ExtensionState, FetchPriority, HostError, InstallProvider, InstalledExtension,
    LocalStateHost, PendingInstall, UpdateCheck,
};
pub use installer::{ExtensionInstaller, InstallResult};
pub use loader::ExtensionLoader;
pub use maintainer::{
    CycleReport, ExtensionMaintainer, MaintainerHandle, MaintenanceSettings, MaintenanceTask,
    TaskOutcome,
};
pub use reconcile::{trigger_immediate_installation, EscalationReport, EnqueueSummary};

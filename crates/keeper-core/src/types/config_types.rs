//! Runtime configuration types
//!
//! These types define configuration that controls where manifests come from,
//! which extensions are tracked, and how often reconciliation runs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::ExtensionId;
use crate::error::{Error, Result};

/// Complete runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeeperConfig {
    /// Stable-channel manifest URL
    pub manifest_url: Url,

    /// Alpha-channel manifest URL
    pub alpha_manifest_url: Url,

    /// Selects the alpha manifest URL when set
    #[serde(default)]
    pub alpha_features: bool,

    /// Extension ids that are always tracked
    #[serde(default)]
    pub builtin_extension_ids: Vec<ExtensionId>,

    /// Directory holding bundled packages and `bundled_extensions.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundled_dir: Option<PathBuf>,

    /// Directory for local host state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    /// Reconciliation timing
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,
}

impl KeeperConfig {
    /// Manifest URL selected by the alpha feature flag
    pub fn effective_manifest_url(&self) -> &Url {
        if self.alpha_features {
            &self.alpha_manifest_url
        } else {
            &self.manifest_url
        }
    }

    /// Reject timing values that would spin the maintenance loop or fail every fetch
    pub fn validate(&self) -> Result<()> {
        if self.maintenance.interval_secs == 0 {
            return Err(Error::invalid_config(
                "maintenance.interval-secs must be greater than zero",
            ));
        }
        if self.network.http_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "network.http-timeout-secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Reconciliation timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MaintenanceConfig {
    /// Delay before the first maintenance cycle
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Interval between the end of one cycle and the start of the next
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Delay before the post-install escalation runs
    #[serde(default = "default_escalation_delay")]
    pub escalation_delay_secs: u64,
}

impl MaintenanceConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn escalation_delay(&self) -> Duration {
        Duration::from_secs(self.escalation_delay_secs)
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            interval_secs: default_interval(),
            escalation_delay_secs: default_escalation_delay(),
        }
    }
}

fn default_initial_delay() -> u64 {
    30
}
fn default_interval() -> u64 {
    900 // 15 minutes
}
fn default_escalation_delay() -> u64 {
    2
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl NetworkConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!(
        "keeper/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Partial configuration read from keeper.yaml
///
/// Every field is optional so a file only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigOverlay {
    pub manifest_url: Option<Url>,
    pub alpha_manifest_url: Option<Url>,
    pub alpha_features: Option<bool>,
    pub builtin_extension_ids: Option<Vec<ExtensionId>>,
    pub bundled_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub maintenance: Option<MaintenanceOverlay>,
    pub network: Option<NetworkOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MaintenanceOverlay {
    pub initial_delay_secs: Option<u64>,
    pub interval_secs: Option<u64>,
    pub escalation_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkOverlay {
    pub http_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl ConfigOverlay {
    /// Apply this overlay on top of `base`
    pub fn apply_to(self, mut base: KeeperConfig) -> KeeperConfig {
        if let Some(url) = self.manifest_url {
            base.manifest_url = url;
        }
        if let Some(url) = self.alpha_manifest_url {
            base.alpha_manifest_url = url;
        }
        if let Some(flag) = self.alpha_features {
            base.alpha_features = flag;
        }
        if let Some(ids) = self.builtin_extension_ids {
            base.builtin_extension_ids = ids;
        }
        if self.bundled_dir.is_some() {
            base.bundled_dir = self.bundled_dir;
        }
        if self.state_dir.is_some() {
            base.state_dir = self.state_dir;
        }
        if let Some(m) = self.maintenance {
            if let Some(v) = m.initial_delay_secs {
                base.maintenance.initial_delay_secs = v;
            }
            if let Some(v) = m.interval_secs {
                base.maintenance.interval_secs = v;
            }
            if let Some(v) = m.escalation_delay_secs {
                base.maintenance.escalation_delay_secs = v;
            }
        }
        if let Some(n) = self.network {
            if let Some(v) = n.http_timeout_secs {
                base.network.http_timeout_secs = v;
            }
            if let Some(v) = n.user_agent {
                base.network.user_agent = v;
            }
        }
        base
    }
}

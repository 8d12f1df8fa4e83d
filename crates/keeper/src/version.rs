//! Build and manifest channel information reported by `keeper version`

use keeper_core::KeeperConfig;
use serde::Serialize;
use std::fmt;
use url::Url;

/// Values stamped in by build.rs
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: Option<&'static str>,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_SHA"),
            build_date: option_env!("BUILD_DATE"),
            target: option_env!("TARGET"),
        }
    }
}

/// Manifest channel picked by the `alpha-features` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Alpha,
}

impl Channel {
    pub fn of(config: &KeeperConfig) -> Self {
        if config.alpha_features {
            Channel::Alpha
        } else {
            Channel::Stable
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stable => write!(f, "stable"),
            Channel::Alpha => write!(f, "alpha"),
        }
    }
}

/// What this binary is and where it would fetch extensions from
#[derive(Debug, Clone, Serialize)]
pub struct VersionReport {
    #[serde(flatten)]
    pub build: BuildInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtin_extensions: Option<usize>,
}

impl VersionReport {
    /// Channel fields are left out when no configuration could be loaded
    pub fn new(build: BuildInfo, config: Option<&KeeperConfig>) -> Self {
        Self {
            build,
            channel: config.map(Channel::of),
            manifest_url: config.map(|c| c.effective_manifest_url().clone()),
            builtin_extensions: config.map(|c| c.builtin_extension_ids.len()),
        }
    }

    /// `keeper <version> [(<commit>)] [<channel>]`
    pub fn summary(&self) -> String {
        let mut line = format!("keeper {}", self.build.version);
        if let Some(commit) = self.build.commit {
            line.push_str(&format!(" ({})", commit));
        }
        if let Some(channel) = self.channel {
            line.push_str(&format!(" {}", channel));
        }
        line
    }
}

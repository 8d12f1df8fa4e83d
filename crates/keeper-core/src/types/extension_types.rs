//! Desired-state manifest and install preference types
//!
//! The manifest wire format is a top-level JSON object keyed by extension id:
//!
//! ```json
//! {
//!   "bflpfmnmnokmjhmgnolecpppdbdophmk": {
//!     "update_url": "https://cdn.browseros.com/extensions/update-manifest.xml",
//!     "name": "Agent"
//!   }
//! }
//! ```
//!
//! Bundled manifests (`bundled_extensions.json`) carry `external_crx` and
//! `external_version` instead of, or alongside, `update_url`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, Result};

/// Stable identifier of an extension
///
/// Ids are non-empty, at most [`ExtensionId::MAX_LEN`] characters, and made of
/// ASCII alphanumerics, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Longest accepted id
    pub const MAX_LEN: usize = 64;

    /// Parse and validate an extension id
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if Self::is_valid(&raw) {
            Ok(Self(raw))
        } else {
            Err(Error::invalid_extension_id(raw))
        }
    }

    /// Check id syntax without allocating
    pub fn is_valid(raw: &str) -> bool {
        !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExtensionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ExtensionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ExtensionId> for String {
    fn from(id: ExtensionId) -> Self {
        id.0
    }
}

impl AsRef<str> for ExtensionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ExtensionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Where an extension was installed from, as reported by the host
///
/// `ExternalComponent` is the provenance marker for extensions this system
/// installs. Only extensions carrying it are ever uninstalled as deprecated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallLocation {
    ExternalComponent,
    ExternalPolicy,
    ExternalPref,
    Internal,
    Unpacked,
}

impl InstallLocation {
    /// Whether this location marks an extension as managed by Keeper
    pub fn is_managed(self) -> bool {
        self == InstallLocation::ExternalComponent
    }
}

impl fmt::Display for InstallLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallLocation::ExternalComponent => write!(f, "external-component"),
            InstallLocation::ExternalPolicy => write!(f, "external-policy"),
            InstallLocation::ExternalPref => write!(f, "external-pref"),
            InstallLocation::Internal => write!(f, "internal"),
            InstallLocation::Unpacked => write!(f, "unpacked"),
        }
    }
}

/// One manifest entry: how to install a single extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallDirective {
    /// Update source for the extension
    #[serde(
        default,
        alias = "external_update_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub update_url: Option<Url>,

    /// Package file relative to the bundled directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_crx: Option<String>,

    /// Version of the bundled package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_version: Option<String>,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_install_by_default")]
    pub install_by_default: bool,

    /// Fields passed through opaquely to the install provider
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_install_by_default() -> bool {
    true
}

impl InstallDirective {
    /// Directive that installs from an update URL
    pub fn from_update_url(update_url: Url) -> Self {
        Self {
            update_url: Some(update_url),
            external_crx: None,
            external_version: None,
            name: None,
            install_by_default: true,
            extra: Map::new(),
        }
    }

    /// Directive that installs a bundled package
    pub fn bundled(crx: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            update_url: None,
            external_crx: Some(crx.into()),
            external_version: Some(version.into()),
            name: None,
            install_by_default: true,
            extra: Map::new(),
        }
    }

    /// Check that the entry names a usable install source
    ///
    /// An entry needs an absolute http(s) `update_url`, or both
    /// `external_crx` and `external_version`.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.update_url {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::invalid_url(
                    url.as_str(),
                    "update_url must use http or https",
                ));
            }
            return Ok(());
        }

        let has_crx = self.external_crx.as_deref().is_some_and(|s| !s.is_empty());
        let has_version = self
            .external_version
            .as_deref()
            .is_some_and(|s| !s.is_empty());
        if has_crx && has_version {
            Ok(())
        } else {
            Err(Error::malformed_manifest(
                "entry needs update_url or external_crx with external_version",
            ))
        }
    }
}

/// The authoritative mapping of extension id to install directive
///
/// Immutable once parsed; a newer fetch replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DesiredStateManifest {
    entries: BTreeMap<ExtensionId, InstallDirective>,
}

impl DesiredStateManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest from already validated entries
    pub fn from_entries(entries: impl IntoIterator<Item = (ExtensionId, InstallDirective)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &str) -> Option<&InstallDirective> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Update URL recorded for an extension, if any
    pub fn update_url(&self, id: &str) -> Option<&Url> {
        self.entries.get(id).and_then(|d| d.update_url.as_ref())
    }

    /// All extension ids in the manifest
    pub fn ids(&self) -> BTreeSet<ExtensionId> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ExtensionId, &InstallDirective)> {
        self.entries.iter()
    }

    /// Serialize back to the wire format
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Install preference for one extension, in the host provider's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPreference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_update_url: Option<Url>,

    /// Absolute path of the bundled package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_crx: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_version: Option<String>,

    pub was_installed_by_default: bool,

    pub location: InstallLocation,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExternalPreference {
    /// Map a manifest directive to a provider preference
    ///
    /// `crx_path` is the resolved bundled package, if any. Returns `None` when
    /// neither an update URL nor a package is available.
    pub fn from_directive(directive: &InstallDirective, crx_path: Option<PathBuf>) -> Option<Self> {
        if directive.update_url.is_none() && crx_path.is_none() {
            return None;
        }

        let external_version = if crx_path.is_some() {
            directive.external_version.clone()
        } else {
            None
        };

        let mut extra = directive.extra.clone();
        if let Some(name) = &directive.name {
            extra.insert("name".to_string(), Value::String(name.clone()));
        }

        Some(Self {
            external_update_url: directive.update_url.clone(),
            external_crx: crx_path,
            external_version,
            was_installed_by_default: directive.install_by_default,
            location: InstallLocation::ExternalComponent,
            extra,
        })
    }
}

/// Preference document handed to the host install provider
pub type PreferenceFragment = BTreeMap<ExtensionId, ExternalPreference>;

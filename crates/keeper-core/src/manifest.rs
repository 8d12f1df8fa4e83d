//! Desired-state manifest parsing
//!
//! Bundled and remote manifests go through the same parser so they are
//! interchangeable. Parsing is partial-success: a document whose top level is
//! not a JSON object is rejected as a whole, but inside a valid object each
//! entry is validated on its own and bad entries are dropped.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{DesiredStateManifest, ExtensionId, InstallDirective};

/// An entry the parser skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    /// Key as it appeared in the document
    pub key: String,
    /// Why the entry was skipped
    pub reason: String,
}

/// Result of parsing one manifest document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedManifest {
    /// Accepted entries
    pub manifest: DesiredStateManifest,
    /// Skipped entries, in document order
    pub dropped: Vec<DroppedEntry>,
}

impl ParsedManifest {
    pub fn into_manifest(self) -> DesiredStateManifest {
        self.manifest
    }
}

/// Parse a manifest document
///
/// Returns an error only when the document is not JSON or its top level is
/// not an object. Callers treat that error as an empty manifest.
pub fn parse_manifest(content: &str) -> Result<ParsedManifest> {
    let document: Value = serde_json::from_str(content)?;

    let Value::Object(object) = document else {
        return Err(Error::malformed_manifest(
            "top-level value must be an object",
        ));
    };

    let mut entries = Vec::with_capacity(object.len());
    let mut dropped = Vec::new();

    for (key, value) in object {
        match parse_entry(&key, value) {
            Ok(entry) => entries.push(entry),
            Err(reason) => {
                warn!("Skipping manifest entry {:?}: {}", key, reason);
                dropped.push(DroppedEntry { key, reason });
            }
        }
    }

    debug!(
        "Parsed manifest: {} accepted, {} dropped",
        entries.len(),
        dropped.len()
    );

    Ok(ParsedManifest {
        manifest: DesiredStateManifest::from_entries(entries),
        dropped,
    })
}

fn parse_entry(
    key: &str,
    value: Value,
) -> std::result::Result<(ExtensionId, InstallDirective), String> {
    let id = ExtensionId::parse(key).map_err(|e| e.to_string())?;

    if !value.is_object() {
        return Err("entry must be an object".to_string());
    }

    let directive: InstallDirective =
        serde_json::from_value(value).map_err(|e| format!("invalid entry: {}", e))?;
    directive.validate().map_err(|e| e.to_string())?;

    Ok((id, directive))
}

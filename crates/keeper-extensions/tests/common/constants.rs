//! Test constants for keeper-extensions tests

#![allow(dead_code)]

use std::time::Duration;

/// Manifest URL used by loader and maintainer tests
pub const TEST_MANIFEST_URL: &str = "https://cdn.example.test/extensions/extensions.json";

/// Alpha manifest URL used by loader tests
pub const TEST_ALPHA_MANIFEST_URL: &str =
    "https://cdn.example.test/extensions/extensions.alpha.json";

/// Version written for bundled packages
pub const TEST_EXTENSION_VERSION: &str = "1.0.0";

/// Delay before the loader escalates
pub const ESCALATION_DELAY: Duration = Duration::from_secs(2);

/// Maintenance timings used with paused time
pub const INITIAL_DELAY: Duration = Duration::from_secs(30);
pub const INTERVAL: Duration = Duration::from_secs(900);

/// Update URL recorded in generated manifests
pub fn update_url_for(id: &str) -> String {
    format!("https://cdn.example.test/extensions/{}/update.xml", id)
}

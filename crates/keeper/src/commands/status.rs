//! Status command

use anyhow::Result;
use camino::Utf8Path;
use keeper_core::ExtensionId;
use keeper_extensions::{ExtensionHost, HealthReport};
use serde_json::json;
use std::collections::BTreeSet;

use crate::cli::StatusArgs;
use crate::output;
use crate::utils;

pub fn run(args: StatusArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = utils::load_config(config_path)?;
    let host = utils::open_host(&config)?;

    let tracked: BTreeSet<ExtensionId> = config.builtin_extension_ids.iter().cloned().collect();
    let installed = host.installed_extensions()?;
    let health = HealthReport::from_installed(&installed, &tracked);
    let state = host.snapshot()?;

    if args.json {
        let status = json!({
            "state_file": host.state_path(),
            "health": health,
            "extensions": state.extensions,
            "pending": state.pending,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    output::header("Extension status");
    output::kv("State file", &host.state_path().display().to_string());
    output::kv("Tracked", &health.tracked.to_string());
    output::kv("Installed", &health.installed.to_string());
    output::kv("Enabled", &health.enabled.to_string());
    output::kv("Disabled", &health.disabled.to_string());
    output::kv("Missing", &health.missing.to_string());

    if !state.extensions.is_empty() {
        output::header("Installed extensions");
        for (id, record) in &state.extensions {
            output::kv(
                id.as_str(),
                &format!(
                    "{} {:?} {} ({})",
                    record.version.as_deref().unwrap_or("-"),
                    record.state,
                    record.location,
                    record.source
                ),
            );
        }
    }

    if !state.pending.is_empty() {
        output::header("Pending installs");
        for (id, pending) in &state.pending {
            output::kv(id.as_str(), &pending.source);
        }
    }

    if health.is_healthy() {
        output::success("All tracked extensions are installed and enabled");
    } else {
        for id in &health.missing_ids {
            output::warning(&format!("{} is not installed", id));
        }
        for id in &health.disabled_ids {
            output::warning(&format!("{} is disabled", id));
        }
    }

    Ok(())
}

//! Version command

use anyhow::Result;
use camino::Utf8Path;
use tracing::warn;

use crate::cli::VersionArgs;
use crate::output;
use crate::utils;
use crate::version::{BuildInfo, VersionReport};

pub fn run(args: VersionArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    // A broken config should not hide the build details
    let config = match utils::load_config(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Configuration unavailable: {:#}", e);
            None
        }
    };
    let report = VersionReport::new(BuildInfo::current(), config.as_ref());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", report.summary());
    if let Some(url) = &report.manifest_url {
        output::kv("Manifest", url.as_str());
    }
    if let Some(count) = report.builtin_extensions {
        output::kv("Built-ins", &count.to_string());
    }
    if let Some(date) = report.build.build_date {
        output::kv("Built", date);
    }
    if let Some(target) = report.build.target {
        output::kv("Target", target);
    }

    Ok(())
}

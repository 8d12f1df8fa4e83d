//! Run command

use anyhow::{Context, Result};
use camino::Utf8Path;
use keeper_extensions::{
    CycleReport, EscalationReport, ExtensionLoader, HttpManifestFetcher, TaskOutcome,
};
use std::sync::Arc;
use tracing::debug;

use crate::cli::RunArgs;
use crate::output;
use crate::utils;

pub async fn run(args: RunArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let mut config = utils::load_config(config_path)?;
    if let Some(dir) = args.bundled_dir {
        config.bundled_dir = Some(dir.into_std_path_buf());
    }

    let host = Arc::new(utils::open_host(&config)?);
    let fetcher =
        Arc::new(HttpManifestFetcher::new(&config.network).context("Failed to build HTTP client")?);
    debug!("Host state at {}", host.state_path().display());

    let mut loader = ExtensionLoader::new(&config, host.clone(), host.clone(), fetcher);
    if let Some(url) = args.manifest_url {
        loader.set_manifest_url(url);
    }

    if args.once {
        return run_once(&mut loader).await;
    }

    loader.start_loading().await;
    print_install_summary(&loader);
    output::info("Maintaining extensions, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    output::info("Stopping maintenance");
    Ok(())
}

async fn run_once(loader: &mut ExtensionLoader) -> Result<()> {
    loader.install().await;
    print_install_summary(loader);

    if let Some(report) = loader.wait_for_escalation().await {
        print_escalation(&report);
    }

    let report = loader.run_maintenance_once().await;
    print_cycle(&report);
    Ok(())
}

fn print_install_summary(loader: &ExtensionLoader) {
    output::header("Installation");
    output::kv("Manifest", loader.manifest_url().as_str());
    output::kv(
        "Source",
        if loader.from_bundled() {
            "bundled"
        } else {
            "remote"
        },
    );
    if let Some(path) = loader.bundled_crx_base_path() {
        output::kv("Bundled dir", &path.display().to_string());
    }
    output::kv("Tracked", &loader.extension_ids().len().to_string());
}

fn print_escalation(report: &EscalationReport) {
    if report.is_noop() {
        output::info("Nothing to install immediately");
        return;
    }

    output::header("Immediate installation");
    output::kv("Queued", &report.enqueue.enqueued.len().to_string());
    output::kv("Skipped", &report.enqueue.skipped.len().to_string());
    for (id, e) in &report.enqueue.failed {
        output::warning(&format!("{}: {}", id, e));
    }
    for e in &report.errors {
        output::warning(&e.to_string());
    }
}

fn print_cycle(report: &CycleReport) {
    output::header(&format!("Maintenance cycle {}", report.cycle));

    if !report.manifest_refreshed {
        output::warning("Manifest unavailable, no corrective action taken");
        return;
    }

    for outcome in &report.outcomes {
        print_outcome(outcome);
    }

    if let Some(health) = &report.health {
        if health.is_healthy() {
            output::success(&format!("All {} tracked extensions healthy", health.tracked));
        } else {
            output::warning(&format!(
                "{} missing, {} disabled of {} tracked",
                health.missing, health.disabled, health.tracked
            ));
        }
    }
}

fn print_outcome(outcome: &TaskOutcome) {
    if outcome.is_success() {
        output::kv(&outcome.task.to_string(), &outcome.affected.to_string());
    } else {
        for e in &outcome.errors {
            output::error(&format!("{}: {}", outcome.task, e));
        }
    }
}

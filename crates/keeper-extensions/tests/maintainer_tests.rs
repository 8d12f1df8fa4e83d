//! Maintainer tests: one reconciliation cycle at a time

mod common;

use common::*;
use keeper_core::{parse_manifest, DesiredStateManifest, InstallLocation};
use keeper_extensions::{
    ExtensionMaintainer, ExtensionState, FetchPriority, MaintenanceSettings, MaintenanceTask,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn maintainer(host: &MockHost, fetcher: &ScriptedFetcher, tracked: &[&str]) -> ExtensionMaintainer {
    let mut maintainer = ExtensionMaintainer::new(
        Arc::new(host.clone()),
        Arc::new(fetcher.clone()),
        MaintenanceSettings {
            initial_delay: INITIAL_DELAY,
            interval: INTERVAL,
        },
    );
    maintainer.prepare(url(TEST_MANIFEST_URL), ids(tracked), DesiredStateManifest::new());
    maintainer
}

#[tokio::test]
async fn test_only_missing_extension_is_enqueued() {
    let host = MockHost::new();
    host.install_managed(&id("a"));
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a", "b"]);

    let report = maintainer.run_cycle().await;

    assert!(report.manifest_refreshed);
    assert_eq!(host.enqueued_ids(), vec![id("b")]);
    let enqueue = host
        .calls()
        .into_iter()
        .find_map(|call| match call {
            HostCall::Enqueue(request) => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!(enqueue.update_url, url(&update_url_for("b")));
    assert_eq!(enqueue.location, InstallLocation::ExternalComponent);
}

#[tokio::test]
async fn test_tasks_run_in_fixed_order() {
    let host = MockHost::new();
    host.install_managed(&id("old"));
    host.install(&id("a"), InstallLocation::ExternalComponent, ExtensionState::Disabled);
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a", "b"]);

    let report = maintainer.run_cycle().await;

    let tasks: Vec<_> = report.outcomes.iter().map(|o| o.task.to_string()).collect();
    assert_eq!(
        tasks,
        [
            "uninstall-deprecated",
            "reinstall-missing",
            "reenable-disabled",
            "force-update-check",
            "log-health",
        ]
    );
    assert_eq!(report.context(), "maintenance-cycle-1");

    assert_eq!(
        host.calls(),
        vec![
            HostCall::Uninstall(id("old")),
            HostCall::Enqueue(keeper_extensions::PendingInstall::external_component(
                id("b"),
                url(&update_url_for("b")),
            )),
            HostCall::Enable(id("a")),
            HostCall::CheckUpdates(keeper_extensions::UpdateCheck::background(ids(&["a", "b"]))),
        ]
    );

    let health = report.health.unwrap();
    assert_eq!(health.tracked, 2);
    assert_eq!(health.installed, 1);
    assert_eq!(health.enabled, 1);
    assert_eq!(health.missing, 1);
}

#[tokio::test]
async fn test_failed_fetch_runs_no_action_and_keeps_state() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b"])).then(None);
    let mut maintainer = maintainer(&host, &fetcher, &["a", "b"]);

    let first = maintainer.run_cycle().await;
    assert!(!first.manifest_refreshed);
    assert!(first.outcomes.is_empty());
    assert!(first.health.is_none());
    assert!(host.calls().is_empty());
    assert!(maintainer.last_manifest().is_empty());
    assert_eq!(maintainer.extension_ids(), &ids(&["a", "b"]));

    let second = maintainer.run_cycle().await;
    assert!(second.manifest_refreshed);
    assert_eq!(second.cycle, 2);
    assert_eq!(second.context(), "maintenance-cycle-2");
    assert_eq!(maintainer.last_manifest().len(), 2);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_manifest() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::failing().then(Some(remote_manifest_json(&["a"]).as_str()));
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    maintainer.run_cycle().await;
    let before = maintainer.last_manifest().clone();
    assert!(before.contains("a"));

    let report = maintainer.run_cycle().await;
    assert!(!report.manifest_refreshed);
    assert_eq!(maintainer.last_manifest(), &before);
}

#[tokio::test]
async fn test_malformed_manifest_counts_as_failed_fetch() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always("[]");
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    let report = maintainer.run_cycle().await;
    assert!(!report.manifest_refreshed);
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn test_manifest_is_replaced_wholesale() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["c"]))
        .then(Some(remote_manifest_json(&["a", "b"]).as_str()));
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    maintainer.run_cycle().await;
    maintainer.run_cycle().await;

    let expected = parse_manifest(&remote_manifest_json(&["c"])).unwrap().into_manifest();
    assert_eq!(maintainer.last_manifest(), &expected);
}

#[tokio::test]
async fn test_untracked_extensions_without_marker_are_kept() {
    let host = MockHost::new();
    host.install(&id("user"), InstallLocation::Internal, ExtensionState::Enabled);
    host.install(&id("policy"), InstallLocation::ExternalPolicy, ExtensionState::Disabled);
    host.install_managed(&id("deprecated"));
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    let report = maintainer.run_cycle().await;

    assert_eq!(
        report.outcome(MaintenanceTask::UninstallDeprecated).unwrap().affected,
        1
    );
    assert_eq!(host.installed_ids(), ids(&["policy", "user"]));
    // Untracked disabled extensions are left alone
    assert_eq!(
        report.outcome(MaintenanceTask::ReenableDisabled).unwrap().affected,
        0
    );
}

#[tokio::test]
async fn test_tracked_id_missing_from_manifest_is_skipped() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a", "z"]);

    let report = maintainer.run_cycle().await;

    assert_eq!(host.enqueued_ids(), vec![id("a")]);
    assert_eq!(report.health.unwrap().missing_ids, vec![id("a"), id("z")]);
}

#[tokio::test]
async fn test_task_failures_are_independent() {
    let host = MockHost::new();
    host.install_managed(&id("old"));
    host.install(&id("a"), InstallLocation::ExternalComponent, ExtensionState::Disabled);
    host.fail_on("uninstall", &id("old"));
    host.fail_on("enqueue", &id("b"));
    host.fail_update_checks();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b", "c"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a", "b", "c"]);

    let report = maintainer.run_cycle().await;

    assert_eq!(report.outcomes.len(), MaintenanceTask::ORDER.len());
    assert!(!report.outcome(MaintenanceTask::UninstallDeprecated).unwrap().is_success());

    let reinstall = report.outcome(MaintenanceTask::ReinstallMissing).unwrap();
    assert_eq!(reinstall.affected, 1);
    assert_eq!(reinstall.errors.len(), 1);
    assert_eq!(host.enqueued_ids(), vec![id("b"), id("c")]);

    assert_eq!(
        report.outcome(MaintenanceTask::ReenableDisabled).unwrap().affected,
        1
    );
    assert!(!report.outcome(MaintenanceTask::ForceUpdateCheck).unwrap().is_success());
    assert!(report.outcome(MaintenanceTask::LogHealth).unwrap().is_success());
    assert_eq!(report.error_count(), 3);
}

#[tokio::test]
async fn test_unreachable_registry_does_not_abort_cycle() {
    let host = MockHost::new();
    host.fail_listing();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    let report = maintainer.run_cycle().await;

    assert_eq!(report.outcomes.len(), MaintenanceTask::ORDER.len());
    assert!(report.health.is_none());
    // The update check does not need the registry listing
    assert_eq!(host.update_checks().len(), 1);
}

#[tokio::test]
async fn test_update_extension_ids_replaces_tracked_set() {
    let host = MockHost::new();
    host.install_managed(&id("a"));
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b"]));
    let mut maintainer = maintainer(&host, &fetcher, &["a"]);

    maintainer.update_extension_ids(ids(&["b"]));
    maintainer.run_cycle().await;

    assert_eq!(maintainer.extension_ids(), &ids(&["b"]));
    assert_eq!(
        host.calls()[..2],
        [
            HostCall::Uninstall(id("a")),
            HostCall::Enqueue(keeper_extensions::PendingInstall::external_component(
                id("b"),
                url(&update_url_for("b")),
            )),
        ]
    );
}

#[tokio::test]
async fn test_force_update_check_is_background() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always("{}");
    let mut maintainer = maintainer(&host, &fetcher, &[]);

    maintainer.run_cycle().await;

    let checks = host.update_checks();
    assert_eq!(checks.len(), 1);
    assert!(checks[0].ids.is_empty());
    assert_eq!(checks[0].priority, FetchPriority::Background);
}

#[tokio::test(start_paused = true)]
async fn test_handle_forwards_id_updates() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a", "b"]));
    let maintainer = ExtensionMaintainer::new(
        Arc::new(host.clone()),
        Arc::new(fetcher.clone()),
        MaintenanceSettings {
            initial_delay: INITIAL_DELAY,
            interval: INTERVAL,
        },
    );

    let handle = maintainer.start(url(TEST_MANIFEST_URL), BTreeSet::new(), DesiredStateManifest::new());
    handle.update_extension_ids(ids(&["b"]));

    tokio::time::sleep(INITIAL_DELAY + Duration::from_secs(1)).await;

    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(host.enqueued_ids(), vec![id("b")]);

    drop(handle);
    tokio::time::sleep(INTERVAL * 2).await;
    assert_eq!(fetcher.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_still_reschedules() {
    let host = MockHost::new();
    let fetcher = ScriptedFetcher::always(remote_manifest_json(&["a"])).then(None);
    let maintainer = ExtensionMaintainer::new(
        Arc::new(host.clone()),
        Arc::new(fetcher.clone()),
        MaintenanceSettings {
            initial_delay: Duration::ZERO,
            interval: INTERVAL,
        },
    );

    let _handle = maintainer.start(url(TEST_MANIFEST_URL), ids(&["a"]), DesiredStateManifest::new());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.call_count(), 1);
    assert!(host.calls().is_empty());

    tokio::time::sleep(INTERVAL).await;
    assert_eq!(fetcher.call_count(), 2);
    assert_eq!(host.enqueued_ids(), vec![id("a")]);
}

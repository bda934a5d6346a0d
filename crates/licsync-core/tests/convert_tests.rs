//! License conversion runs against the in-memory inventory

use licsync_core::prelude::*;
use licsync_core::{
    InventoryError, LicenseType, OutcomeStatus, PacingPolicy, ALREADY_CONFIGURED,
    WHATIF_NOT_EXECUTED,
};
use licsync_test_utils::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn inputs(names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .map(|name| WorkItem::from(InputRecord::new(RESOURCE_GROUP, *name)))
        .collect()
}

fn to_payg_with_cores() -> RunMode {
    RunMode::Convert(DesiredConfiguration::payg().with_physical_core(true))
}

#[tokio::test]
async fn test_convert_writes_full_patch_for_each_paid_record() {
    let inventory = Arc::new(
        MemoryInventory::new()
            .with_server(paid_server("sql01"))
            .with_server(paid_server("sql02")),
    );

    let outcomes = engine(&inventory)
        .run(inputs(&["sql01", "sql02"]), &to_payg_with_cores(), &RunOptions::new())
        .await;

    let updates = inventory.calls().updates;
    assert_eq!(updates.len(), 2);
    for (resource_id, patch) in &updates {
        let props = patch.properties();
        assert_eq!(props["licenseType"], json!("PAYG"));
        assert_eq!(
            props["usePhysicalCoreLicense"],
            json!({"isApplied": true, "lastUpdatedTimestamp": fixed_now_stamp()})
        );
        // untouched keys are written back as they were
        assert_eq!(props["cores"], json!(8));
        assert_eq!(props["status"], json!("Connected"));
        assert!(resource_id.ends_with("sql01") || resource_id.ends_with("sql02"));
    }

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!(
        (summary.total, summary.succeeded, summary.failed, summary.skipped),
        (2, 2, 0, 0)
    );
    for outcome in &outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Success);
        let applied = outcome.applied.as_ref().unwrap();
        assert_eq!(applied.license_type, LicenseType::Payg);
        assert!(applied.physical_core_applied());
        assert_eq!(
            outcome.previous.as_ref().unwrap().license_type,
            LicenseType::Paid
        );
    }

    let stored = inventory.server(&server_id("sql01")).unwrap();
    assert_eq!(stored.properties["licenseType"], json!("PAYG"));
}

#[tokio::test]
async fn test_dry_run_issues_no_writes() {
    let inventory = Arc::new(
        MemoryInventory::new()
            .with_server(paid_server("sql01"))
            .with_server(paid_server("sql02")),
    );

    let outcomes = engine(&inventory)
        .run(
            inputs(&["sql01", "sql02"]),
            &to_payg_with_cores(),
            &RunOptions::new().with_dry_run(true),
        )
        .await;

    assert!(inventory.calls().updates.is_empty());
    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!(summary.skipped, 2);
    assert!(summary.convert_balanced());
    for outcome in &outcomes {
        assert_eq!(outcome.message.as_deref(), Some(WHATIF_NOT_EXECUTED));
        assert_eq!(outcome.message.as_deref(), Some("WhatIf — not executed"));
        assert_eq!(
            outcome.target.as_ref().map(|t| t.license_type),
            Some(LicenseType::Payg)
        );
        assert!(outcome.applied.is_none());
    }
}

#[tokio::test]
async fn test_already_configured_record_is_skipped() {
    let inventory = Arc::new(MemoryInventory::new().with_server(converted_server("sql01")));

    let outcomes = engine(&inventory)
        .run(inputs(&["sql01"]), &to_payg_with_cores(), &RunOptions::new())
        .await;

    assert_eq!(outcomes[0].status, OutcomeStatus::Skipped);
    assert_eq!(outcomes[0].message.as_deref(), Some(ALREADY_CONFIGURED));
    assert!(inventory.calls().updates.is_empty());
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let inventory = Arc::new(MemoryInventory::new().with_server(paid_server("sql01")));
    let engine = engine(&inventory);

    engine
        .run(inputs(&["sql01"]), &to_payg_with_cores(), &RunOptions::new())
        .await;
    let second = engine
        .run(inputs(&["sql01"]), &to_payg_with_cores(), &RunOptions::new())
        .await;

    assert_eq!(second[0].status, OutcomeStatus::Skipped);
    assert_eq!(inventory.calls().updates.len(), 1);
}

#[tokio::test]
async fn test_one_outcome_per_input_and_balanced_summary() {
    let inventory = Arc::new(
        MemoryInventory::new()
            .with_server(paid_server("ok"))
            .with_server(converted_server("done"))
            .with_server(paid_server("denied"))
            .fail_update(
                &server_id("denied"),
                InventoryError::Forbidden("write not permitted".into()),
            )
            .fail_get("broken", InventoryError::Transient("503".into())),
    );
    let names = ["ok", "missing", "done", "denied", "broken"];

    let outcomes = engine(&inventory)
        .run(inputs(&names), &to_payg_with_cores(), &RunOptions::new())
        .await;

    assert_eq!(outcomes.len(), names.len());
    let order: Vec<&str> = outcomes.iter().map(|o| o.identity.name.as_str()).collect();
    assert_eq!(order, names);

    let statuses: Vec<OutcomeStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        [
            OutcomeStatus::Success,
            OutcomeStatus::Failed,
            OutcomeStatus::Skipped,
            OutcomeStatus::Failed,
            OutcomeStatus::Failed,
        ]
    );
    assert!(outcomes[3]
        .message
        .as_deref()
        .unwrap()
        .contains("write not permitted"));

    let summary = RunSummary::from_outcomes(&outcomes);
    assert!(summary.convert_balanced());
    assert_eq!(summary.failed, 3);
}

#[tokio::test]
async fn test_parallel_workers_keep_input_order() {
    let names: Vec<String> = (0..12).map(|i| format!("sql{i:02}")).collect();
    let inventory = names
        .iter()
        .fold(MemoryInventory::new(), |inv, name| inv.with_server(paid_server(name)));
    let inventory = Arc::new(inventory);
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    let options = RunOptions::new().with_pacing(PacingPolicy::sequential().with_workers(4));
    let outcomes = engine(&inventory)
        .run(inputs(&name_refs), &to_payg_with_cores(), &options)
        .await;

    let order: Vec<&str> = outcomes.iter().map(|o| o.identity.name.as_str()).collect();
    assert_eq!(order, name_refs);
    assert_eq!(inventory.calls().updates.len(), 12);
}

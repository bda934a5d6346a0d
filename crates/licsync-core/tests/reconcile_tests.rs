//! Orphan reconciliation runs against the in-memory inventory

use licsync_core::prelude::*;
use licsync_core::{InventoryError, OrphanAction, OutcomeStatus, ServerFilter};
use licsync_test_utils::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn listed(records: Vec<licsync_core::ServerLicenseRecord>) -> Vec<WorkItem> {
    records.into_iter().map(WorkItem::from).collect()
}

#[tokio::test]
async fn test_reconcile_classifies_every_orphan_state() {
    let (inventory, records) = reconcile_fixture();

    let outcomes = engine(&inventory)
        .run(
            listed(records),
            &RunMode::Reconcile { delete_orphans: false },
            &RunOptions::new(),
        )
        .await;

    let statuses: Vec<OutcomeStatus> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        [
            OutcomeStatus::OrphanedNoReference,
            OutcomeStatus::OrphanedReferenceNotFound,
            OutcomeStatus::Valid,
        ]
    );

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!((summary.valid, summary.orphaned), (1, 2));
    assert!(summary.reconcile_balanced());
    assert!(inventory.calls().deletes.is_empty());
    assert!(outcomes.iter().all(|o| o.action.is_none()));
}

#[tokio::test]
async fn test_delete_orphans_deletes_exactly_the_orphans() {
    let (inventory, records) = reconcile_fixture();

    let outcomes = engine(&inventory)
        .run(
            listed(records),
            &RunMode::Reconcile { delete_orphans: true },
            &RunOptions::new(),
        )
        .await;

    let deletes = inventory.calls().deletes;
    assert_eq!(deletes, vec![server_id("sql-noref"), server_id("sql-dangling")]);
    assert_eq!(outcomes[0].action, Some(OrphanAction::Deleted));
    assert_eq!(outcomes[1].action, Some(OrphanAction::Deleted));
    assert_eq!(outcomes[2].action, None);

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!(summary.deleted, 2);
    assert_eq!(inventory.snapshot().servers.len(), 1);
}

#[tokio::test]
async fn test_dry_run_marks_would_delete() {
    let (inventory, records) = reconcile_fixture();

    let outcomes = engine(&inventory)
        .run(
            listed(records),
            &RunMode::Reconcile { delete_orphans: true },
            &RunOptions::new().with_dry_run(true),
        )
        .await;

    assert!(inventory.calls().deletes.is_empty());
    assert_eq!(RunSummary::from_outcomes(&outcomes).would_delete, 2);
    assert_eq!(outcomes[0].action, Some(OrphanAction::WouldDelete));
}

#[tokio::test]
async fn test_forbidden_lookup_is_never_deleted() {
    let record = paid_server("sql-locked");
    let inventory = Arc::new(
        MemoryInventory::new()
            .with_server(record.clone())
            .fail_lookup(
                "HOST-sql-locked",
                InventoryError::Forbidden("no read on machines".into()),
            ),
    );

    let outcomes = engine(&inventory)
        .run(
            listed(vec![record]),
            &RunMode::Reconcile { delete_orphans: true },
            &RunOptions::new(),
        )
        .await;

    assert_eq!(outcomes[0].status, OutcomeStatus::ErrorChecking);
    assert_eq!(outcomes[0].action, None);
    assert!(outcomes[0]
        .message
        .as_deref()
        .unwrap()
        .contains("no read on machines"));
    assert!(inventory.calls().deletes.is_empty());

    let summary = RunSummary::from_outcomes(&outcomes);
    assert_eq!((summary.error_checking, summary.orphaned), (1, 0));
}

#[tokio::test]
async fn test_blank_reference_counts_as_missing() {
    let record = server_with("sql-blank", Some("   "), json!({"licenseType": "Paid"}));
    let inventory = Arc::new(MemoryInventory::new().with_server(record.clone()));

    let outcomes = engine(&inventory)
        .run(
            listed(vec![record]),
            &RunMode::Reconcile { delete_orphans: false },
            &RunOptions::new(),
        )
        .await;

    assert_eq!(outcomes[0].status, OutcomeStatus::OrphanedNoReference);
    assert!(inventory.calls().lookups.is_empty());
}

#[tokio::test]
async fn test_reconcile_from_input_locators_counts_unreadable_as_failed() {
    let (inventory, _) = reconcile_fixture();
    let items = vec![
        WorkItem::from(InputRecord::new(RESOURCE_GROUP, "sql-valid")),
        WorkItem::from(InputRecord::new(RESOURCE_GROUP, "sql-unknown")),
    ];

    let outcomes = engine(&inventory)
        .run(
            items,
            &RunMode::Reconcile { delete_orphans: true },
            &RunOptions::new(),
        )
        .await;

    assert_eq!(outcomes[0].status, OutcomeStatus::Valid);
    assert_eq!(outcomes[1].status, OutcomeStatus::Failed);
    let summary = RunSummary::from_outcomes(&outcomes);
    assert!(summary.reconcile_balanced());
}

#[tokio::test]
async fn test_listing_scope_feeds_the_run() {
    let (inventory, _) = reconcile_fixture();
    let session = session();
    let records = inventory
        .list_servers(&session, &ServerFilter::resource_group(RESOURCE_GROUP.to_uppercase()))
        .await
        .unwrap();
    assert_eq!(records.len(), 3);

    let outcomes = engine(&inventory)
        .run(
            listed(records),
            &RunMode::Reconcile { delete_orphans: false },
            &RunOptions::new(),
        )
        .await;
    assert_eq!(outcomes.len(), 3);
    assert!(inventory.calls().gets.is_empty());
}

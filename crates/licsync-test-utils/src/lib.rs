//! Testing utilities for the licsync workspace
//!
//! Shared fixtures: server records, host registrations, sessions and a
//! frozen clock.

#![allow(missing_docs)]

use chrono::{DateTime, TimeZone, Utc};
use licsync_core::{
    ExecutionEngine, FixedClock, HostRegistration, MemoryInventory, ServerLicenseRecord,
    SessionContext,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";
pub const RESOURCE_GROUP: &str = "rg-sql";
pub const SERVER_TYPE: &str = "Microsoft.AzureArcData/sqlServerInstances";
pub const HOST_TYPE: &str = "Microsoft.HybridCompute/machines";

/// Instant every fixture clock is frozen at
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// `fixed_now()` as written into physical-core timestamps
pub fn fixed_now_stamp() -> String {
    "2024-06-01T09:30:00Z".to_string()
}

pub fn server_id(name: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{RESOURCE_GROUP}/providers/{SERVER_TYPE}/{name}")
}

pub fn host_id(name: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{RESOURCE_GROUP}/providers/{HOST_TYPE}/{name}")
}

/// Record with arbitrary properties and host reference
pub fn server_with(name: &str, container: Option<&str>, properties: Value) -> ServerLicenseRecord {
    let mut record: ServerLicenseRecord = serde_json::from_value(json!({
        "name": name,
        "resourceGroup": RESOURCE_GROUP,
        "resourceId": server_id(name),
        "location": "westeurope",
        "version": "SQL Server 2019",
        "edition": "Enterprise",
    }))
    .unwrap();
    record.container_resource_id = container.map(str::to_string);
    if let Value::Object(map) = properties {
        record.properties = map;
    }
    record
}

/// Paid record hosted on `HOST-<name>`
pub fn paid_server(name: &str) -> ServerLicenseRecord {
    server_with(
        name,
        Some(&host_id(&format!("HOST-{name}"))),
        json!({
            "licenseType": "Paid",
            "edition": "Enterprise",
            "cores": 8,
            "status": "Connected"
        }),
    )
}

/// PAYG record with the physical-core flag already applied
pub fn converted_server(name: &str) -> ServerLicenseRecord {
    server_with(
        name,
        Some(&host_id(&format!("HOST-{name}"))),
        json!({
            "licenseType": "PAYG",
            "edition": "Enterprise",
            "usePhysicalCoreLicense": {
                "isApplied": true,
                "lastUpdatedTimestamp": "2024-01-01T00:00:00Z"
            }
        }),
    )
}

pub fn host(name: &str) -> HostRegistration {
    HostRegistration {
        name: name.to_string(),
        resource_group: RESOURCE_GROUP.to_string(),
        status: Some("Connected".to_string()),
    }
}

pub fn session() -> Arc<SessionContext> {
    Arc::new(SessionContext::anonymous(SUBSCRIPTION).unwrap())
}

/// Engine over `inventory` with the fixture session and a frozen clock
pub fn engine(inventory: &Arc<MemoryInventory>) -> ExecutionEngine {
    ExecutionEngine::new(inventory.clone(), inventory.clone(), session())
        .with_clock(Arc::new(FixedClock(fixed_now())))
}

/// Three records covering every orphan state: no reference, dangling
/// reference, and a live host
pub fn reconcile_fixture() -> (Arc<MemoryInventory>, Vec<ServerLicenseRecord>) {
    let no_reference = server_with("sql-noref", None, json!({"licenseType": "Paid"}));
    let dangling = server_with(
        "sql-dangling",
        Some(&host_id("HOST-GONE")),
        json!({"licenseType": "Paid"}),
    );
    let valid = paid_server("sql-valid");

    let inventory = MemoryInventory::new()
        .with_server(no_reference.clone())
        .with_server(dangling.clone())
        .with_server(valid.clone())
        .with_host(host("HOST-sql-valid"));

    (Arc::new(inventory), vec![no_reference, dangling, valid])
}

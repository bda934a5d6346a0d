//! Server inventory export
//!
//! Writes one row per listed record. The first three columns are the
//! required input columns, so the file can be fed straight back into
//! `convert --input` or `reconcile --input`.

use chrono::{DateTime, Utc};
use licsync_core::report::artifact_file_name;
use licsync_core::{PropertyKeys, ReportError, ReportKind, ServerLicenseRecord};
use std::path::{Path, PathBuf};

/// Column order of the inventory file
pub const INVENTORY_COLUMNS: [&str; 9] = [
    "ServerName",
    "ResourceGroup",
    "MachineName",
    "Location",
    "LicenseType",
    "PhysicalCoreApplied",
    "Version",
    "Edition",
    "ContainerResourceId",
];

/// Write `records` to `<dir>/ServerInventory_<stamp>.csv`
///
/// # Errors
/// Returns [`ReportError`] if the file cannot be written
pub fn write_inventory(
    dir: &Path,
    records: &[ServerLicenseRecord],
    keys: &PropertyKeys,
    now: DateTime<Utc>,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(artifact_file_name(ReportKind::Inventory, now, "csv"));
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(INVENTORY_COLUMNS)?;

    for record in records {
        let config = record.configuration(keys);
        let physical_core = config
            .physical_core
            .as_ref()
            .map(|p| p.is_applied.to_string())
            .unwrap_or_default();
        writer.write_record([
            record.name.as_str(),
            record.resource_group.as_str(),
            record.machine_name().as_deref().unwrap_or(""),
            record.location.as_deref().unwrap_or(""),
            config.license_type.as_str(),
            physical_core.as_str(),
            record.version.as_deref().unwrap_or(""),
            record.edition.as_deref().unwrap_or(""),
            record.host_reference().unwrap_or(""),
        ])?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), records = records.len(), "Inventory written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::load_input;
    use chrono::TimeZone;

    fn record(name: &str, container: Option<&str>) -> ServerLicenseRecord {
        ServerLicenseRecord {
            name: name.to_string(),
            resource_group: "rg".to_string(),
            resource_id: format!("/x/{name}"),
            container_resource_id: container.map(str::to_string),
            location: Some("westeurope".to_string()),
            version: None,
            edition: Some("Standard".to_string()),
            properties: licsync_core::PropertyMap::new(),
        }
    }

    #[test]
    fn inventory_file_is_valid_input() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let records = vec![
            record("sql01", Some("rg/HOST01")),
            record("sql, odd", None),
        ];

        let path = write_inventory(dir.path(), &records, &PropertyKeys::default(), now).unwrap();
        assert!(path.ends_with("ServerInventory_20240102_030405.csv"));

        let inputs = load_input(&path).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].machine.as_deref(), Some("HOST01"));
        assert_eq!(inputs[1].locator.name, "sql, odd");
    }
}

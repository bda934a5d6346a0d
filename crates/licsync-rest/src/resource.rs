//! Resource envelopes returned by the inventory API

use licsync_core::{HostRegistration, InventoryError, PropertyMap, ServerLicenseRecord};
use serde::Deserialize;
use serde_json::Value;

/// A single resource
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ArmResource {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) location: Option<String>,
    #[serde(default)]
    pub(crate) properties: PropertyMap,
}

/// One page of a listing
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ArmPage {
    #[serde(default)]
    pub(crate) value: Vec<ArmResource>,
    #[serde(rename = "nextLink", default)]
    pub(crate) next_link: Option<String>,
}

/// Resource group segment of a resource id
pub(crate) fn resource_group_of(id: &str) -> Option<String> {
    let mut segments = id.split('/').filter(|s| !s.is_empty());
    segments
        .by_ref()
        .find(|s| s.eq_ignore_ascii_case("resourceGroups"))?;
    segments.next().map(str::to_string)
}

fn string_property(properties: &PropertyMap, key: &str) -> Option<String> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl ArmResource {
    /// Server-license-record view
    ///
    /// # Errors
    /// [`InventoryError::Decode`] when the id carries no resource group
    pub(crate) fn into_server(self) -> Result<ServerLicenseRecord, InventoryError> {
        let resource_group = resource_group_of(&self.id).ok_or_else(|| {
            InventoryError::Decode(format!("resource id '{}' has no resource group", self.id))
        })?;
        Ok(ServerLicenseRecord {
            container_resource_id: string_property(&self.properties, "containerResourceId"),
            version: string_property(&self.properties, "version"),
            edition: string_property(&self.properties, "edition"),
            name: self.name,
            resource_group,
            resource_id: self.id,
            location: self.location,
            properties: self.properties,
        })
    }

    /// Host registration view
    ///
    /// # Errors
    /// [`InventoryError::Decode`] when the id carries no resource group
    pub(crate) fn into_host(self) -> Result<HostRegistration, InventoryError> {
        let resource_group = resource_group_of(&self.id).ok_or_else(|| {
            InventoryError::Decode(format!("resource id '{}' has no resource group", self.id))
        })?;
        Ok(HostRegistration {
            status: string_property(&self.properties, "status"),
            name: self.name,
            resource_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_group_is_read_from_id() {
        assert_eq!(
            resource_group_of("/subscriptions/s/resourceGroups/rg-1/providers/A.B/c/d").as_deref(),
            Some("rg-1")
        );
        assert_eq!(resource_group_of("/subscriptions/s"), None);
    }

    #[test]
    fn server_view_keeps_every_property() {
        let resource: ArmResource = serde_json::from_value(json!({
            "id": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.AzureArcData/sqlServerInstances/sql01",
            "name": "sql01",
            "location": "westeurope",
            "properties": {
                "containerResourceId": "/subscriptions/s/resourceGroups/rg/providers/Microsoft.HybridCompute/machines/HOST01",
                "licenseType": "Paid",
                "edition": "Standard",
                "vCore": "4"
            }
        }))
        .unwrap();

        let record = resource.into_server().unwrap();
        assert_eq!(record.resource_group, "rg");
        assert_eq!(record.edition.as_deref(), Some("Standard"));
        assert_eq!(record.machine_name().as_deref(), Some("HOST01"));
        assert_eq!(record.properties["vCore"], json!("4"));
    }

    #[test]
    fn missing_resource_group_is_a_decode_error() {
        let resource: ArmResource =
            serde_json::from_value(json!({"id": "weird", "name": "x"})).unwrap();
        assert!(matches!(resource.into_host(), Err(InventoryError::Decode(_))));
    }
}

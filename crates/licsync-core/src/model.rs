//! Core data model
//!
//! - [`ServerLicenseRecord`]: a registered database-server license entity
//! - [`HostRegistration`]: the compute host a record claims to run on
//! - [`LicenseConfiguration`]: typed view over a record's property map

use crate::config::PropertyKeys;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Property map of a server-license-record
pub type PropertyMap = Map<String, Value>;

/// License mode of a server record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LicenseType {
    /// License purchased up front
    Paid,
    /// Consumption-based billing
    #[serde(rename = "PAYG")]
    Payg,
    /// Missing or unrecognized value
    Unknown,
}

impl LicenseType {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Payg => "PAYG",
            Self::Unknown => "Unknown",
        }
    }

    /// Lenient read of a property value; anything unrecognized is `Unknown`
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        value
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only `Paid` and `PAYG` (any case) are accepted
impl FromStr for LicenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paid" => Ok(Self::Paid),
            "payg" => Ok(Self::Payg),
            other => Err(format!("unknown license type '{other}' (expected Paid or PAYG)")),
        }
    }
}

/// Physical-core-license entitlement flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalCoreLicense {
    /// Whether the entitlement is applied
    pub is_applied: bool,
    /// ISO-8601 timestamp of the last change
    #[serde(
        rename = "lastUpdatedTimestamp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<String>,
}

impl PhysicalCoreLicense {
    /// Applied flag stamped with the given timestamp
    #[inline]
    #[must_use]
    pub fn applied_at(timestamp: impl Into<String>) -> Self {
        Self {
            is_applied: true,
            last_updated: Some(timestamp.into()),
        }
    }

    /// Lenient read of a property value
    ///
    /// Accepts the `{isApplied, lastUpdatedTimestamp}` object or a bare
    /// boolean; `null` and other shapes read as absent.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        match value? {
            Value::Bool(applied) => Some(Self {
                is_applied: *applied,
                last_updated: None,
            }),
            Value::Object(map) => {
                let is_applied = map.get("isApplied").and_then(Value::as_bool)?;
                let last_updated = map
                    .get("lastUpdatedTimestamp")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Some(Self {
                    is_applied,
                    last_updated,
                })
            }
            _ => None,
        }
    }

    /// Property value written back to the inventory
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("isApplied".to_string(), Value::Bool(self.is_applied));
        if let Some(ts) = &self.last_updated {
            map.insert("lastUpdatedTimestamp".to_string(), Value::String(ts.clone()));
        }
        Value::Object(map)
    }
}

/// Typed view of the license-related properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseConfiguration {
    /// Current license mode
    pub license_type: LicenseType,
    /// Physical-core flag, absent when the record never carried one
    pub physical_core: Option<PhysicalCoreLicense>,
}

impl LicenseConfiguration {
    /// Create configuration
    #[inline]
    #[must_use]
    pub fn new(license_type: LicenseType, physical_core: Option<PhysicalCoreLicense>) -> Self {
        Self {
            license_type,
            physical_core,
        }
    }

    /// Read the view out of a property map
    #[must_use]
    pub fn from_properties(properties: &PropertyMap, keys: &PropertyKeys) -> Self {
        Self {
            license_type: LicenseType::from_value(properties.get(&keys.license_type)),
            physical_core: PhysicalCoreLicense::from_value(properties.get(&keys.physical_core)),
        }
    }

    /// Whether the physical-core flag is present and applied
    #[inline]
    #[must_use]
    pub fn physical_core_applied(&self) -> bool {
        self.physical_core.as_ref().is_some_and(|p| p.is_applied)
    }
}

/// A registered database-server license entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerLicenseRecord {
    /// Name, unique within the resource group
    pub name: String,
    /// Owning resource group
    pub resource_group: String,
    /// Opaque stable handle used for writes and deletes
    pub resource_id: String,
    /// Reference to the backing host registration
    #[serde(default)]
    pub container_resource_id: Option<String>,
    /// Region
    #[serde(default)]
    pub location: Option<String>,
    /// Product version (descriptive)
    #[serde(default)]
    pub version: Option<String>,
    /// Product edition (descriptive)
    #[serde(default)]
    pub edition: Option<String>,
    /// Full property map as last read
    #[serde(default)]
    pub properties: PropertyMap,
}

impl ServerLicenseRecord {
    /// Typed license view using the given property keys
    #[inline]
    #[must_use]
    pub fn configuration(&self, keys: &PropertyKeys) -> LicenseConfiguration {
        LicenseConfiguration::from_properties(&self.properties, keys)
    }

    /// Host reference, if one is set and not blank
    #[inline]
    #[must_use]
    pub fn host_reference(&self) -> Option<&str> {
        self.container_resource_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Machine name implied by the host reference (last path segment)
    #[must_use]
    pub fn machine_name(&self) -> Option<String> {
        self.host_reference()
            .and_then(|r| r.trim_end_matches('/').rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// A host registration as resolved by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRegistration {
    /// Host name
    pub name: String,
    /// Owning resource group
    pub resource_group: String,
    /// Registry status string (e.g. `Connected`), if reported
    #[serde(default)]
    pub status: Option<String>,
}

/// Locates a server record by name within the session's subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerLocator {
    /// Resource group
    pub resource_group: String,
    /// Server name
    pub name: String,
}

impl ServerLocator {
    /// Create locator
    #[inline]
    #[must_use]
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServerLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Scope of a listing call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFilter {
    /// Restrict to one resource group
    pub resource_group: Option<String>,
}

impl ServerFilter {
    /// Whole subscription
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// One resource group
    #[inline]
    #[must_use]
    pub fn resource_group(resource_group: impl Into<String>) -> Self {
        Self {
            resource_group: Some(resource_group.into()),
        }
    }

    /// Whether a record falls inside this filter
    #[must_use]
    pub fn matches(&self, record: &ServerLicenseRecord) -> bool {
        self.resource_group
            .as_deref()
            .map_or(true, |rg| rg.eq_ignore_ascii_case(&record.resource_group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn license_type_parse_is_case_insensitive() {
        assert_eq!("payg".parse::<LicenseType>(), Ok(LicenseType::Payg));
        assert_eq!(" Paid ".parse::<LicenseType>(), Ok(LicenseType::Paid));
        assert!("LicenseOnly".parse::<LicenseType>().is_err());
    }

    #[test]
    fn unrecognized_license_value_reads_unknown() {
        assert_eq!(LicenseType::from_value(Some(&json!("LicenseOnly"))), LicenseType::Unknown);
        assert_eq!(LicenseType::from_value(None), LicenseType::Unknown);
        assert_eq!(LicenseType::from_value(Some(&json!(42))), LicenseType::Unknown);
    }

    #[test]
    fn physical_core_reads_object_and_bool() {
        let obj = json!({"isApplied": true, "lastUpdatedTimestamp": "2026-01-01T00:00:00Z"});
        assert_eq!(
            PhysicalCoreLicense::from_value(Some(&obj)),
            Some(PhysicalCoreLicense::applied_at("2026-01-01T00:00:00Z"))
        );
        assert_eq!(
            PhysicalCoreLicense::from_value(Some(&json!(false))).map(|p| p.is_applied),
            Some(false)
        );
        assert_eq!(PhysicalCoreLicense::from_value(Some(&Value::Null)), None);
    }

    #[test]
    fn configuration_uses_configured_keys() {
        let props = json!({
            "license": "PAYG",
            "physicalCoreLicense": {"isApplied": true}
        });
        let keys = PropertyKeys {
            license_type: "license".into(),
            physical_core: "physicalCoreLicense".into(),
        };
        let config = LicenseConfiguration::from_properties(props.as_object().unwrap(), &keys);
        assert_eq!(config.license_type, LicenseType::Payg);
        assert!(config.physical_core_applied());
    }

    #[test]
    fn blank_reference_is_no_reference() {
        let record = ServerLicenseRecord {
            name: "sql01".into(),
            resource_group: "rg".into(),
            resource_id: "/x".into(),
            container_resource_id: Some("   ".into()),
            location: None,
            version: None,
            edition: None,
            properties: Map::new(),
        };
        assert_eq!(record.host_reference(), None);
        assert_eq!(record.machine_name(), None);
    }

    #[test]
    fn filter_matches_resource_group_case_insensitively() {
        let record: ServerLicenseRecord = serde_json::from_value(json!({
            "name": "sql01",
            "resourceGroup": "RG-Prod",
            "resourceId": "/x"
        }))
        .unwrap();
        assert!(ServerFilter::resource_group("rg-prod").matches(&record));
        assert!(!ServerFilter::resource_group("rg-dev").matches(&record));
        assert!(ServerFilter::all().matches(&record));
    }
}

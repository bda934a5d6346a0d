//! Mutation planning
//!
//! Computes the minimal change that brings a record's license configuration
//! to a target. The emitted [`PropertyPatch`] is a full reconstruction of
//! the current property map with only the changed keys overwritten, so
//! settings this tool does not understand are written back untouched.

use crate::config::PropertyKeys;
use crate::model::{LicenseConfiguration, LicenseType, PhysicalCoreLicense, PropertyMap};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Reason reported when no change is needed
pub const ALREADY_CONFIGURED: &str = "Already Configured";

/// Target configuration requested by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredConfiguration {
    /// Target license mode
    pub license_type: LicenseType,
    /// Whether the physical-core flag must end up applied
    pub enable_physical_core_license: bool,
}

impl DesiredConfiguration {
    /// Convert to consumption-based billing
    #[inline]
    #[must_use]
    pub fn payg() -> Self {
        Self {
            license_type: LicenseType::Payg,
            enable_physical_core_license: false,
        }
    }

    /// With a specific license type
    #[inline]
    #[must_use]
    pub fn with_license_type(mut self, license_type: LicenseType) -> Self {
        self.license_type = license_type;
        self
    }

    /// With physical-core flag requested
    #[inline]
    #[must_use]
    pub fn with_physical_core(mut self, enable: bool) -> Self {
        self.enable_physical_core_license = enable;
        self
    }
}

impl Default for DesiredConfiguration {
    fn default() -> Self {
        Self::payg()
    }
}

/// Property map to write, plus what changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPatch {
    /// Reconstructed property map
    properties: PropertyMap,
    /// Keys whose values differ from the current map
    changed_keys: Vec<String>,
    /// License view of the reconstructed map
    resulting: LicenseConfiguration,
}

impl PropertyPatch {
    /// Full property map to send
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Keys overwritten by this patch
    #[inline]
    #[must_use]
    pub fn changed_keys(&self) -> &[String] {
        &self.changed_keys
    }

    /// License configuration after the patch is applied
    #[inline]
    #[must_use]
    pub fn resulting(&self) -> &LicenseConfiguration {
        &self.resulting
    }

    /// Merge into an existing property map (partial-update semantics)
    pub fn apply_to(&self, target: &mut PropertyMap) {
        for (key, value) in &self.properties {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Planner decision
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Already compliant
    Noop {
        /// Why nothing needs to change
        reason: &'static str,
    },
    /// Write this patch
    Patch(PropertyPatch),
}

impl Plan {
    /// Whether no change is needed
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop { .. })
    }

    /// The patch, if any
    #[inline]
    #[must_use]
    pub fn patch(&self) -> Option<&PropertyPatch> {
        match self {
            Self::Patch(patch) => Some(patch),
            Self::Noop { .. } => None,
        }
    }
}

/// Mutation planner bound to a set of property keys
#[derive(Debug, Clone, Default)]
pub struct MutationPlanner {
    keys: PropertyKeys,
}

impl MutationPlanner {
    /// Create planner
    #[inline]
    #[must_use]
    pub fn new(keys: PropertyKeys) -> Self {
        Self { keys }
    }

    /// Property keys in use
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &PropertyKeys {
        &self.keys
    }

    /// Plan the change from `current` to `desired`
    ///
    /// `now` stamps a newly applied physical-core flag.
    #[must_use]
    pub fn plan(
        &self,
        current: &PropertyMap,
        desired: &DesiredConfiguration,
        now: DateTime<Utc>,
    ) -> Plan {
        let view = LicenseConfiguration::from_properties(current, &self.keys);

        let license_changes = view.license_type != desired.license_type;
        let core_changes = desired.enable_physical_core_license && !view.physical_core_applied();

        if !license_changes && !core_changes {
            return Plan::Noop {
                reason: ALREADY_CONFIGURED,
            };
        }

        let mut properties = reconstruct(current);
        let mut changed_keys = Vec::new();

        if license_changes {
            properties.insert(
                self.keys.license_type.clone(),
                serde_json::Value::String(desired.license_type.as_str().to_string()),
            );
            changed_keys.push(self.keys.license_type.clone());
        }
        if core_changes {
            let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
            properties.insert(
                self.keys.physical_core.clone(),
                PhysicalCoreLicense::applied_at(stamp).to_value(),
            );
            changed_keys.push(self.keys.physical_core.clone());
        }

        let resulting = LicenseConfiguration::from_properties(&properties, &self.keys);
        Plan::Patch(PropertyPatch {
            properties,
            changed_keys,
            resulting,
        })
    }
}

/// Rebuild the property map key by key, copying nested maps one level deep
fn reconstruct(current: &PropertyMap) -> PropertyMap {
    current
        .iter()
        .map(|(key, value)| {
            let copied = match value {
                serde_json::Value::Object(inner) => serde_json::Value::Object(
                    inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                ),
                other => other.clone(),
            };
            (key.clone(), copied)
        })
        .collect()
}

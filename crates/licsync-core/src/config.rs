//! Run configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicsyncConfig {
    /// Base URL of the resource inventory API
    pub endpoint: String,
    /// Resource type of server-license-records (`<namespace>/<type>`)
    pub server_resource_type: String,
    /// Resource type of host registrations (`<namespace>/<type>`)
    pub host_resource_type: String,
    /// API version used for server-license-record calls
    pub server_api_version: String,
    /// API version used for host-registration calls
    pub host_api_version: String,
    /// API version of the subscription read that checks access before a run
    pub subscription_api_version: String,
    /// Property keys the planner reads and writes
    pub property_keys: PropertyKeys,
    /// Pacing of external calls
    pub pacing: PacingPolicy,
}

impl LicsyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file is unreadable, not TOML, or fails validation
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// With pacing policy
    #[inline]
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Reject configurations that cannot drive a run
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pacing.workers == 0 {
            return Err(ConfigError::Invalid("pacing.workers must be at least 1".into()));
        }
        if self.property_keys.license_type.trim().is_empty()
            || self.property_keys.physical_core.trim().is_empty()
        {
            return Err(ConfigError::Invalid("property keys must not be empty".into()));
        }
        if self
            .property_keys
            .license_type
            .trim()
            .eq_ignore_ascii_case(self.property_keys.physical_core.trim())
        {
            return Err(ConfigError::Invalid(format!(
                "property_keys.license_type and property_keys.physical_core must differ, both are '{}'",
                self.property_keys.license_type
            )));
        }
        for (field, value) in [
            ("server_resource_type", &self.server_resource_type),
            ("host_resource_type", &self.host_resource_type),
        ] {
            if value.split('/').filter(|s| !s.is_empty()).count() != 2 {
                return Err(ConfigError::Invalid(format!(
                    "{field} must look like '<namespace>/<type>', got '{value}'"
                )));
            }
        }
        Ok(())
    }
}

impl Default for LicsyncConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://management.azure.com".to_string(),
            server_resource_type: "Microsoft.AzureArcData/sqlServerInstances".to_string(),
            host_resource_type: "Microsoft.HybridCompute/machines".to_string(),
            server_api_version: "2024-01-01".to_string(),
            host_api_version: "2024-07-10".to_string(),
            subscription_api_version: "2022-12-01".to_string(),
            property_keys: PropertyKeys::default(),
            pacing: PacingPolicy::default(),
        }
    }
}

/// Names of the properties this tool understands
///
/// The physical-core flag has been published under different names across
/// backend API versions, so both keys are configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyKeys {
    /// Key holding the license mode
    pub license_type: String,
    /// Key holding the `{isApplied, lastUpdatedTimestamp}` object
    pub physical_core: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            license_type: "licenseType".to_string(),
            physical_core: "usePhysicalCoreLicense".to_string(),
        }
    }
}

/// Pacing of external calls
///
/// `workers = 1` is strictly sequential. Higher values keep at most that many
/// records in flight; outcomes are still produced in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingPolicy {
    /// Records in flight at once
    pub workers: usize,
    /// Pause before each record's first external call, in milliseconds
    pub delay_ms: u64,
}

impl PacingPolicy {
    /// Strictly sequential, no delay
    #[inline]
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// With worker count (clamped to at least 1)
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// With per-record delay
    #[inline]
    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Delay as a [`Duration`], `None` when zero
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            workers: 1,
            delay_ms: 0,
        }
    }
}

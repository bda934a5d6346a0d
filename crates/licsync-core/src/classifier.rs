//! Record classification
//!
//! Decides whether a server record's backing host is demonstrably present,
//! demonstrably absent, or could not be verified. Pure; the caller performs
//! the single host lookup and passes its result in.
//!
//! A record is only ever orphaned when the registry answered "not found".
//! Every inconclusive path lands in [`RecordStatus::ErrorChecking`].

use crate::error::{InventoryError, ReferenceError};
use crate::model::{HostRegistration, ServerLicenseRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a server record against the host registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Host registration exists
    Valid,
    /// Record carries no host reference
    OrphanedNoReference,
    /// Host reference points at a registration that does not exist
    OrphanedReferenceNotFound,
    /// Host could not be verified; never eligible for deletion
    ErrorChecking,
}

impl RecordStatus {
    /// Either orphan variant
    #[inline]
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        matches!(
            self,
            Self::OrphanedNoReference | Self::OrphanedReferenceNotFound
        )
    }

    /// Stable name used in reports
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "Valid",
            Self::OrphanedNoReference => "OrphanedNoReference",
            Self::OrphanedReferenceNotFound => "OrphanedReferenceNotFound",
            Self::ErrorChecking => "ErrorChecking",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of resolving a record's host reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLookup {
    /// Registry returned the registration
    Found(HostRegistration),
    /// Registry answered "not found"
    NotFound,
    /// Registry call failed for another reason
    Failed(InventoryError),
    /// Reference present but not parseable; no call was made
    Unparseable(ReferenceError),
}

impl HostLookup {
    /// Fold a registry call result into a lookup result
    #[must_use]
    pub fn from_result(result: Result<HostRegistration, InventoryError>) -> Self {
        match result {
            Ok(host) => Self::Found(host),
            Err(e) if e.is_not_found() => Self::NotFound,
            Err(e) => Self::Failed(e),
        }
    }

    /// Human-readable explanation for non-found, non-valid results
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Found(_) => None,
            Self::NotFound => Some("host registration not found".to_string()),
            Self::Failed(e) => Some(format!("host lookup failed: {e}")),
            Self::Unparseable(e) => Some(format!("host reference unusable: {e}")),
        }
    }
}

/// Classify a record
///
/// `lookup` is `None` when no host call was made. That is only conclusive
/// for records without a reference.
#[must_use]
pub fn classify(record: &ServerLicenseRecord, lookup: Option<&HostLookup>) -> RecordStatus {
    if record.host_reference().is_none() {
        return RecordStatus::OrphanedNoReference;
    }
    match lookup {
        Some(HostLookup::NotFound) => RecordStatus::OrphanedReferenceNotFound,
        Some(HostLookup::Found(_)) => RecordStatus::Valid,
        Some(HostLookup::Failed(_) | HostLookup::Unparseable(_)) | None => {
            RecordStatus::ErrorChecking
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::Map;

    fn record(reference: Option<&str>) -> ServerLicenseRecord {
        ServerLicenseRecord {
            name: "sql01".into(),
            resource_group: "rg".into(),
            resource_id: "/sql01".into(),
            container_resource_id: reference.map(str::to_string),
            location: None,
            version: None,
            edition: None,
            properties: Map::new(),
        }
    }

    fn host() -> HostRegistration {
        HostRegistration {
            name: "HOST01".into(),
            resource_group: "rg".into(),
            status: Some("Connected".into()),
        }
    }

    #[test]
    fn empty_reference_wins_over_lookup() {
        let found = HostLookup::Found(host());
        assert_eq!(classify(&record(None), Some(&found)), RecordStatus::OrphanedNoReference);
        assert_eq!(classify(&record(Some("")), None), RecordStatus::OrphanedNoReference);
    }

    #[test]
    fn decision_table() {
        let r = record(Some("rg/HOST01"));
        assert_eq!(classify(&r, Some(&HostLookup::Found(host()))), RecordStatus::Valid);
        assert_eq!(
            classify(&r, Some(&HostLookup::NotFound)),
            RecordStatus::OrphanedReferenceNotFound
        );
        assert_eq!(
            classify(&r, Some(&HostLookup::Failed(InventoryError::Forbidden("denied".into())))),
            RecordStatus::ErrorChecking
        );
        assert_eq!(
            classify(&r, Some(&HostLookup::Unparseable(ReferenceError::Empty))),
            RecordStatus::ErrorChecking
        );
        assert_eq!(classify(&r, None), RecordStatus::ErrorChecking);
    }

    #[test]
    fn from_result_separates_not_found() {
        assert_eq!(
            HostLookup::from_result(Err(InventoryError::NotFound("h".into()))),
            HostLookup::NotFound
        );
        assert!(matches!(
            HostLookup::from_result(Err(InventoryError::Transient("h".into()))),
            HostLookup::Failed(_)
        ));
    }

    fn non_not_found_error() -> impl Strategy<Value = InventoryError> {
        prop_oneof![
            any::<String>().prop_map(InventoryError::Unauthorized),
            any::<String>().prop_map(InventoryError::Forbidden),
            any::<String>().prop_map(InventoryError::Throttled),
            any::<String>().prop_map(InventoryError::Transient),
            any::<String>().prop_map(InventoryError::Transport),
            any::<String>().prop_map(InventoryError::Decode),
            (400u16..600, any::<String>()).prop_map(|(status, message)| InventoryError::Api {
                status,
                code: "Error".into(),
                message,
                inner: None,
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_lookup_errors_never_orphan(err in non_not_found_error(), reference in "[a-z]{1,8}/[A-Z0-9]{1,8}") {
            let r = record(Some(&reference));
            let lookup = HostLookup::from_result(Err(err));
            let status = classify(&r, Some(&lookup));
            prop_assert!(!status.is_orphaned());
            prop_assert_eq!(status, RecordStatus::ErrorChecking);
        }
    }
}

//! Per-record outcomes and run summaries

use crate::classifier::RecordStatus;
use crate::model::LicenseConfiguration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who an outcome is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordIdentity {
    /// Server name
    pub name: String,
    /// Resource group
    pub resource_group: String,
    /// Host machine name, when known
    pub machine: Option<String>,
    /// Region, when known
    pub location: Option<String>,
}

impl RecordIdentity {
    /// Create identity
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
            machine: None,
            location: None,
        }
    }

    /// With machine name; blank names are stored as `None`
    #[inline]
    #[must_use]
    pub fn with_machine(mut self, machine: Option<String>) -> Self {
        self.machine = non_blank(machine);
        self
    }

    /// With location; blank values are stored as `None`
    #[inline]
    #[must_use]
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = non_blank(location);
        self
    }
}

// Reports write absent values as empty cells, so "" and None must not differ.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Final status of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Change written
    Success,
    /// Resolution or write failed
    Failed,
    /// Nothing written (already compliant or dry run)
    Skipped,
    /// Host verified present
    Valid,
    /// No host reference
    OrphanedNoReference,
    /// Host reference dangling
    OrphanedReferenceNotFound,
    /// Host could not be verified
    ErrorChecking,
}

impl OutcomeStatus {
    /// Stable name used in reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
            Self::Valid => RecordStatus::Valid.as_str(),
            Self::OrphanedNoReference => RecordStatus::OrphanedNoReference.as_str(),
            Self::OrphanedReferenceNotFound => RecordStatus::OrphanedReferenceNotFound.as_str(),
            Self::ErrorChecking => RecordStatus::ErrorChecking.as_str(),
        }
    }

    /// Either orphan variant
    #[inline]
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        matches!(self, Self::OrphanedNoReference | Self::OrphanedReferenceNotFound)
    }
}

impl From<RecordStatus> for OutcomeStatus {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Valid => Self::Valid,
            RecordStatus::OrphanedNoReference => Self::OrphanedNoReference,
            RecordStatus::OrphanedReferenceNotFound => Self::OrphanedReferenceNotFound,
            RecordStatus::ErrorChecking => Self::ErrorChecking,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::Success,
            Self::Failed,
            Self::Skipped,
            Self::Valid,
            Self::OrphanedNoReference,
            Self::OrphanedReferenceNotFound,
            Self::ErrorChecking,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

/// Action taken on an orphaned record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrphanAction {
    /// Dry run: would have been deleted
    WouldDelete,
    /// Deleted
    Deleted,
    /// Delete call failed; the record still exists
    FailedToDelete,
}

impl OrphanAction {
    /// Report label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WouldDelete => "Would Delete",
            Self::Deleted => "Deleted",
            Self::FailedToDelete => "Failed to Delete",
        }
    }
}

impl fmt::Display for OrphanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrphanAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::WouldDelete, Self::Deleted, Self::FailedToDelete]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// What happened to one input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// Record identity
    pub identity: RecordIdentity,
    /// Configuration read before any change
    pub previous: Option<LicenseConfiguration>,
    /// Configuration the run aimed for
    pub target: Option<LicenseConfiguration>,
    /// Configuration actually written
    pub applied: Option<LicenseConfiguration>,
    /// Final status
    pub status: OutcomeStatus,
    /// Orphan action, reconcile runs only
    pub action: Option<OrphanAction>,
    /// Reason or error text
    pub message: Option<String>,
    /// When the outcome was recorded
    pub timestamp: DateTime<Utc>,
}

impl ProcessingOutcome {
    /// Create outcome with no configuration attached
    #[must_use]
    pub fn new(identity: RecordIdentity, status: OutcomeStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity,
            previous: None,
            target: None,
            applied: None,
            status,
            action: None,
            message: None,
            timestamp,
        }
    }

    /// Failed outcome carrying the error text
    #[must_use]
    pub fn failed(identity: RecordIdentity, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(identity, OutcomeStatus::Failed, timestamp).with_message(message)
    }

    /// With previous configuration
    #[inline]
    #[must_use]
    pub fn with_previous(mut self, previous: LicenseConfiguration) -> Self {
        self.previous = Some(previous);
        self
    }

    /// With target configuration
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: LicenseConfiguration) -> Self {
        self.target = Some(target);
        self
    }

    /// With applied configuration
    #[inline]
    #[must_use]
    pub fn with_applied(mut self, applied: LicenseConfiguration) -> Self {
        self.applied = Some(applied);
        self
    }

    /// With orphan action
    #[inline]
    #[must_use]
    pub fn with_action(mut self, action: OrphanAction) -> Self {
        self.action = Some(action);
        self
    }

    /// With message; a blank message clears it
    #[inline]
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = non_blank(Some(message.into()));
        self
    }
}

/// Counters folded over a run's outcomes
///
/// Convert runs satisfy `succeeded + failed + skipped == total`.
/// Reconcile runs satisfy `valid + orphaned + error_checking + failed == total`,
/// where `failed` counts records that could not be read at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub valid: usize,
    pub orphaned: usize,
    pub error_checking: usize,
    pub deleted: usize,
    pub would_delete: usize,
    pub delete_failed: usize,
}

impl RunSummary {
    /// Fold outcomes into counters
    #[must_use]
    pub fn from_outcomes(outcomes: &[ProcessingOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            summary.total += 1;
            match outcome.status {
                OutcomeStatus::Success => summary.succeeded += 1,
                OutcomeStatus::Failed => summary.failed += 1,
                OutcomeStatus::Skipped => summary.skipped += 1,
                OutcomeStatus::Valid => summary.valid += 1,
                OutcomeStatus::OrphanedNoReference | OutcomeStatus::OrphanedReferenceNotFound => {
                    summary.orphaned += 1;
                }
                OutcomeStatus::ErrorChecking => summary.error_checking += 1,
            }
            match outcome.action {
                Some(OrphanAction::Deleted) => summary.deleted += 1,
                Some(OrphanAction::WouldDelete) => summary.would_delete += 1,
                Some(OrphanAction::FailedToDelete) => summary.delete_failed += 1,
                None => {}
            }
            summary
        })
    }

    /// Convert-run invariant
    #[inline]
    #[must_use]
    pub fn convert_balanced(&self) -> bool {
        self.succeeded + self.failed + self.skipped == self.total
    }

    /// Reconcile-run invariant
    #[inline]
    #[must_use]
    pub fn reconcile_balanced(&self) -> bool {
        self.valid + self.orphaned + self.error_checking + self.failed == self.total
    }

    /// Whether any record needs operator attention
    #[inline]
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.delete_failed > 0 || self.error_checking > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus) -> ProcessingOutcome {
        ProcessingOutcome::new(RecordIdentity::new("s", "rg"), status, Utc::now())
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        let identity = RecordIdentity::new("s", "rg")
            .with_machine(Some(String::new()))
            .with_location(Some("  ".to_string()));
        assert_eq!(identity.machine, None);
        assert_eq!(identity.location, None);

        let outcome = outcome(OutcomeStatus::Skipped).with_message("");
        assert_eq!(outcome.message, None);
    }

    #[test]
    fn status_names_round_trip() {
        for status in [
            OutcomeStatus::Success,
            OutcomeStatus::Failed,
            OutcomeStatus::Skipped,
            OutcomeStatus::Valid,
            OutcomeStatus::OrphanedNoReference,
            OutcomeStatus::OrphanedReferenceNotFound,
            OutcomeStatus::ErrorChecking,
        ] {
            assert_eq!(status.as_str().parse::<OutcomeStatus>(), Ok(status));
        }
        assert_eq!("Failed to Delete".parse::<OrphanAction>(), Ok(OrphanAction::FailedToDelete));
    }

    #[test]
    fn convert_summary_balances() {
        let outcomes = vec![
            outcome(OutcomeStatus::Success),
            outcome(OutcomeStatus::Failed),
            outcome(OutcomeStatus::Skipped),
            outcome(OutcomeStatus::Skipped),
        ];
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.skipped, 2);
        assert!(summary.convert_balanced());
    }

    #[test]
    fn reconcile_summary_keeps_error_checking_separate() {
        let outcomes = vec![
            outcome(OutcomeStatus::Valid),
            outcome(OutcomeStatus::OrphanedNoReference).with_action(OrphanAction::Deleted),
            outcome(OutcomeStatus::OrphanedReferenceNotFound)
                .with_action(OrphanAction::FailedToDelete),
            outcome(OutcomeStatus::ErrorChecking),
        ];
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.valid, 1);
        assert_eq!(summary.orphaned, 2);
        assert_eq!(summary.error_checking, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.delete_failed, 1);
        assert!(summary.reconcile_balanced());
        assert!(summary.has_failures());
    }
}
